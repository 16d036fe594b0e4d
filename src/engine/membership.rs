use crate::limits::*;
use crate::model::*;
use crate::notify::Notice;

use super::conflict::now_ms;
use super::{Engine, EngineError};

impl Engine {
    /// Center-owner signup: create the organization and its owner
    /// membership together. Either both persist or neither does.
    pub async fn create_organization(
        &self,
        owner_id: UserId,
        attrs: OrganizationAttrs,
    ) -> Result<Organization, EngineError> {
        if owner_id.is_nil() {
            return Err(EngineError::Validation("missing owner id"));
        }
        if attrs.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("organization name too long"));
        }
        if attrs.languages.len() > MAX_LANGUAGES {
            return Err(EngineError::LimitExceeded("too many languages"));
        }

        let organization = Organization {
            id: OrgId::new(),
            name: attrs.name,
            description: attrs.description,
            country: attrs.country,
            languages: attrs.languages,
            owner_id,
            tutor_ids: Vec::new(),
            learner_ids: Vec::new(),
            created_at: now_ms(),
        };
        let membership = Membership {
            user_id: owner_id,
            organization_id: organization.id,
            role: MemberRole::Owner,
        };

        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.organizations.push(organization.clone());
        next.memberships.push(membership);
        self.commit(&mut state, next).await?;

        metrics::counter!(crate::observability::ORGANIZATIONS_CREATED_TOTAL).increment(1);
        Ok(organization)
    }

    /// Open a pending request to join a center as tutor or learner.
    pub async fn request_membership(
        &self,
        user_id: UserId,
        organization_id: OrgId,
        role: MemberRole,
    ) -> Result<MembershipRequest, EngineError> {
        if user_id.is_nil() {
            return Err(EngineError::Validation("missing user id"));
        }
        if role == MemberRole::Owner {
            return Err(EngineError::Validation("owner role cannot be requested"));
        }

        let mut state = self.state.write().await;
        if state.organization(&organization_id).is_none() {
            return Err(EngineError::NotFound(organization_id));
        }
        if state.has_pending_request(&user_id, &organization_id) {
            return Err(EngineError::DuplicateRequest { user_id, organization_id });
        }
        if state.membership_role(&user_id, &organization_id).is_some() {
            return Err(EngineError::DuplicateMembership { user_id, organization_id });
        }

        let request = MembershipRequest {
            id: RequestId::new(),
            user_id,
            organization_id,
            role,
            status: RequestStatus::Pending,
            created_at: now_ms(),
        };

        let mut next = state.clone();
        next.membership_requests.push(request.clone());
        self.commit(&mut state, next).await?;

        metrics::counter!(crate::observability::MEMBERSHIP_REQUESTS_TOTAL).increment(1);
        let owner_id = state
            .organization(&organization_id)
            .map(|o| o.owner_id)
            .expect("organization present under lock");
        self.notify
            .send(owner_id, &Notice::MembershipRequested { request: request.clone() });
        Ok(request)
    }

    /// Promote a pending request to a membership, as one operation: the
    /// request is deleted, the membership created, and the user added to
    /// the organization's role list. Only the organization owner may do
    /// this.
    pub async fn approve_request(
        &self,
        actor_id: UserId,
        request_id: RequestId,
    ) -> Result<Membership, EngineError> {
        let mut state = self.state.write().await;
        let request = state
            .membership_requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or(EngineError::NotFound(request_id))?;
        if request.status != RequestStatus::Pending {
            return Err(EngineError::Validation("request is not pending"));
        }
        self.require_owner(&state, &actor_id, &request.organization_id)?;
        // The user may have become a member through another path since
        // the request was opened.
        if state
            .membership_role(&request.user_id, &request.organization_id)
            .is_some()
        {
            return Err(EngineError::DuplicateMembership {
                user_id: request.user_id,
                organization_id: request.organization_id,
            });
        }

        let membership = Membership {
            user_id: request.user_id,
            organization_id: request.organization_id,
            role: request.role,
        };

        let mut next = state.clone();
        next.membership_requests.retain(|r| r.id != request_id);
        next.memberships.push(membership.clone());
        let org = next
            .organization_mut(&request.organization_id)
            .ok_or(EngineError::NotFound(request.organization_id))?;
        let list = match request.role {
            MemberRole::Tutor => &mut org.tutor_ids,
            MemberRole::Learner => &mut org.learner_ids,
            MemberRole::Owner => unreachable!("owner role rejected at request time"),
        };
        if !list.contains(&request.user_id) {
            list.push(request.user_id);
        }
        self.commit(&mut state, next).await?;

        self.notify.send(
            membership.user_id,
            &Notice::MembershipApproved { membership: membership.clone() },
        );
        Ok(membership)
    }

    /// Mark a pending request rejected. The request is kept, so the UI can
    /// show the outcome; a new request for the same center stays possible.
    pub async fn reject_request(
        &self,
        actor_id: UserId,
        request_id: RequestId,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let request = state
            .membership_requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or(EngineError::NotFound(request_id))?;
        if request.status != RequestStatus::Pending {
            return Err(EngineError::Validation("request is not pending"));
        }
        self.require_owner(&state, &actor_id, &request.organization_id)?;

        let mut next = state.clone();
        let target = next
            .membership_requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .expect("request present under lock");
        target.status = RequestStatus::Rejected;
        self.commit(&mut state, next).await
    }

    fn require_owner(
        &self,
        state: &Snapshot,
        actor_id: &UserId,
        organization_id: &OrgId,
    ) -> Result<(), EngineError> {
        match state.membership_role(actor_id, organization_id) {
            Some(MemberRole::Owner) => Ok(()),
            _ => Err(EngineError::Validation("actor is not the organization owner")),
        }
    }
}
