use parlor_shared::constants::{
    MAX_CONTACT_NAME_LEN, MAX_NOTE_BODY_LEN, PERMISSION_MANAGE_CONTACT_REQUESTS,
};
use parlor_shared::{validate, ContactRequestId, Principal};
use parlor_store::{now, ContactRequest, StoreError};
use serde::Deserialize;
use tracing::info;

use super::{Coordinator, Page};
use crate::error::ServerError;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

fn require_inbox_access(principal: &Principal) -> Result<(), ServerError> {
    if principal.has_permission(PERMISSION_MANAGE_CONTACT_REQUESTS) {
        Ok(())
    } else {
        Err(ServerError::forbidden("Contact inbox access required"))
    }
}

impl Coordinator {
    /// Public submission; no principal involved.
    pub async fn submit_contact_request(
        &self,
        req: SubmitContactRequest,
    ) -> Result<ContactRequest, ServerError> {
        let request = ContactRequest {
            id: ContactRequestId::new(),
            name: validate::required_text("name", &req.name, MAX_CONTACT_NAME_LEN)?,
            email: validate::email(&req.email)?,
            message: validate::required_text("message", &req.message, MAX_NOTE_BODY_LEN)?,
            is_read: false,
            read_at: None,
            created_at: now(),
            deleted_at: None,
        };

        let row = request.clone();
        self.persist("submit_contact_request", move |db| {
            db.insert_contact_request(&row)?;
            Ok(())
        })
        .await?;

        info!(request = %request.id, "Contact request received");
        self.refresh_inbox_counts().await;

        Ok(request)
    }

    pub async fn list_contact_requests(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<Vec<ContactRequest>, ServerError> {
        require_inbox_access(principal)?;
        self.query(move |db| Ok(db.list_contact_requests(page.limit(), page.offset())?))
            .await
    }

    pub async fn mark_contact_request_read(
        &self,
        principal: &Principal,
        request_id: ContactRequestId,
    ) -> Result<ContactRequest, ServerError> {
        require_inbox_access(principal)?;

        let (request, changed) = self
            .persist("mark_contact_request_read", move |db| {
                let current = match db.get_contact_request(request_id) {
                    Ok(r) if r.deleted_at.is_none() => r,
                    Ok(_) | Err(StoreError::NotFound) => {
                        return Err(ServerError::not_found("Contact request not found"))
                    }
                    Err(e) => return Err(e.into()),
                };
                if current.is_read {
                    return Ok((current, false));
                }
                db.mark_contact_request_read(request_id, now())?;
                Ok((db.get_contact_request(request_id)?, true))
            })
            .await?;

        if changed {
            self.refresh_inbox_counts().await;
        }
        Ok(request)
    }

    pub async fn delete_contact_request(
        &self,
        principal: &Principal,
        request_id: ContactRequestId,
    ) -> Result<(), ServerError> {
        require_inbox_access(principal)?;

        let deleted = self
            .persist("delete_contact_request", move |db| {
                Ok(db.soft_delete_contact_request(request_id, now())?)
            })
            .await?;
        if !deleted {
            return Err(ServerError::not_found("Contact request not found"));
        }

        info!(request = %request_id, actor = %principal.id, "Contact request deleted");
        self.refresh_inbox_counts().await;
        Ok(())
    }

    /// The inbox count is shared; push it to every connected inbox manager.
    async fn refresh_inbox_counts(&self) {
        let managers = self
            .registry()
            .connected_with_permission(PERMISSION_MANAGE_CONTACT_REQUESTS)
            .await;
        self.publish(&managers, Vec::new()).await;
    }
}
