// service/ticket_service.rs
use std::sync::Arc;

use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        ticketdb::{NewAttachment, TicketExt, TicketFilter, TicketListOptions, ViewerScope},
        userdb::UserExt,
    },
    models::{
        ticketmodel::{
            validate_comment, validate_description, validate_subject, CommentWithAuthor, Ticket,
            TicketAttachment, TicketDetails, TicketStatistics, TicketStatus, TicketWithCustomer,
        },
        usermodel::{User, UserRole},
    },
    service::{
        error::ServiceError,
        storage::{FileMetadata, StorageService, UploadFile},
    },
};

#[derive(Debug, Clone)]
pub struct TicketService {
    db_client: Arc<DBClient>,
    storage: Arc<StorageService>,
    max_files_per_ticket: usize,
}

impl TicketService {
    pub fn new(
        db_client: Arc<DBClient>,
        storage: Arc<StorageService>,
        max_files_per_ticket: usize,
    ) -> Self {
        Self {
            db_client,
            storage,
            max_files_per_ticket,
        }
    }

    /// Creates a ticket with its attachments. Files are validated before
    /// any network call; uploads run sequentially under keys namespaced by
    /// the pre-generated ticket id; the database rows land in a single
    /// transaction only after every upload succeeded. On failure the
    /// already-uploaded objects are deleted again, so neither storage nor
    /// the database keeps partial state.
    pub async fn create_ticket(
        &self,
        user_id: Uuid,
        subject: &str,
        description: &str,
        files: Vec<UploadFile>,
    ) -> Result<(Ticket, Vec<TicketAttachment>), ServiceError> {
        let subject = validate_subject(subject).map_err(ServiceError::Validation)?;
        let description = validate_description(description).map_err(ServiceError::Validation)?;

        let user = self
            .db_client
            .get_user(Some(user_id), None)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        if !user.is_active() {
            return Err(ServiceError::UserInactive(user_id));
        }

        if files.len() > self.max_files_per_ticket {
            return Err(ServiceError::TooManyFiles(self.max_files_per_ticket));
        }

        for file in &files {
            crate::service::storage::validate_upload(file, self.storage.max_upload_bytes())?;
        }

        let ticket_id = Uuid::new_v4();
        let mut uploaded: Vec<String> = Vec::with_capacity(files.len());
        let mut attachments: Vec<NewAttachment> = Vec::with_capacity(files.len());

        for file in files {
            match self
                .storage
                .upload_file(file, user_id, Some(ticket_id))
                .await
            {
                Ok(stored) => {
                    uploaded.push(stored.key.clone());
                    attachments.push(NewAttachment {
                        s3_key: stored.key,
                        content_type: stored.content_type,
                        file_name: stored.file_name,
                    });
                }
                Err(e) => {
                    // Compensating cleanup: drop whatever already landed.
                    self.storage.delete_files(&uploaded).await;
                    return Err(e.into());
                }
            }
        }

        let ticket = match self
            .db_client
            .create_ticket_with_attachments(
                ticket_id,
                user_id,
                subject,
                description,
                &attachments,
            )
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                self.storage.delete_files(&uploaded).await;
                return Err(e.into());
            }
        };

        let attachment_rows = self.db_client.get_ticket_attachments(ticket_id).await?;

        Ok((ticket, attachment_rows))
    }

    pub async fn get_ticket(
        &self,
        ticket_id: Uuid,
        user: &User,
    ) -> Result<TicketDetails, ServiceError> {
        let scope = ViewerScope::for_user(user);

        match self.db_client.get_ticket_with_details(ticket_id, scope).await? {
            Some(details) => Ok(details),
            None => {
                // Distinguish a missing ticket from someone else's.
                let ticket = self
                    .db_client
                    .get_ticket(ticket_id)
                    .await?
                    .ok_or(ServiceError::TicketNotFound(ticket_id))?;

                if !ticket.can_be_accessed_by(user.id, user.role) {
                    return Err(ServiceError::Forbidden);
                }
                Err(ServiceError::TicketNotFound(ticket_id))
            }
        }
    }

    pub async fn list_my_tickets(
        &self,
        user_id: Uuid,
        opts: TicketListOptions,
    ) -> Result<(Vec<Ticket>, i64), ServiceError> {
        let status = opts.status;
        let tickets = self.db_client.get_user_tickets(user_id, opts).await?;
        let total = self.db_client.count_user_tickets(user_id, status).await?;

        Ok((tickets, total))
    }

    pub async fn list_tickets(
        &self,
        user: &User,
        filter: TicketFilter,
    ) -> Result<(Vec<TicketWithCustomer>, i64), ServiceError> {
        self.require_admin(user)?;

        let tickets = self.db_client.list_tickets(&filter).await?;
        let total = self.db_client.count_tickets(&filter).await?;

        Ok((tickets, total))
    }

    pub async fn statistics(&self, user: &User) -> Result<TicketStatistics, ServiceError> {
        self.require_admin(user)?;

        Ok(self.db_client.get_ticket_statistics().await?)
    }

    /// Appends a comment. Closed tickets reject it; a resolved ticket
    /// reopens to in_progress in the same transaction as the insert.
    pub async fn add_comment(
        &self,
        ticket_id: Uuid,
        user: &User,
        text: &str,
    ) -> Result<CommentWithAuthor, ServiceError> {
        let ticket = self
            .db_client
            .get_ticket(ticket_id)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;

        if !ticket.can_be_updated_by(user.id, user.role) {
            return Err(ServiceError::Forbidden);
        }

        let text = validate_comment(text).map_err(ServiceError::Validation)?;

        if !ticket.accepts_comments() {
            return Err(ServiceError::TicketClosed(ticket_id));
        }

        let reopen_to = ticket.comment_reopen_target();
        let comment = self
            .db_client
            .add_ticket_comment(ticket_id, user.id, text, reopen_to)
            .await?;

        let display_name = if user.role == UserRole::Admin && ticket.user_id != user.id {
            "Support Agent".to_string()
        } else {
            "You".to_string()
        };

        Ok(CommentWithAuthor {
            comment,
            display_name,
        })
    }

    pub async fn update_status(
        &self,
        ticket_id: Uuid,
        user: &User,
        status: TicketStatus,
    ) -> Result<Ticket, ServiceError> {
        self.require_admin(user)?;

        self.db_client
            .get_ticket(ticket_id)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;

        Ok(self.db_client.update_ticket_status(ticket_id, status).await?)
    }

    pub async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        user: &User,
        assignee_id: Uuid,
    ) -> Result<Ticket, ServiceError> {
        self.require_admin(user)?;

        self.db_client
            .get_ticket(ticket_id)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;

        let assignee = self
            .db_client
            .get_user(Some(assignee_id), None)
            .await?
            .ok_or(ServiceError::UserNotFound(assignee_id))?;

        if assignee.role != UserRole::Admin {
            return Err(ServiceError::AssigneeNotAdmin(assignee_id));
        }

        Ok(self.db_client.assign_ticket(ticket_id, assignee_id).await?)
    }

    /// Cascade delete. The database transaction commits first; storage
    /// objects are then removed best-effort, and a storage failure never
    /// resurrects the ticket.
    pub async fn delete_ticket(&self, ticket_id: Uuid, user: &User) -> Result<(), ServiceError> {
        self.require_admin(user)?;

        self.db_client
            .get_ticket(ticket_id)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))?;

        let keys = self.db_client.delete_ticket(ticket_id).await?;
        self.storage.delete_files(&keys).await;

        Ok(())
    }

    pub async fn get_attachment_url(
        &self,
        s3_key: &str,
        user: &User,
    ) -> Result<String, ServiceError> {
        let attachment = self.resolve_attachment(s3_key, user).await?;

        Ok(self.storage.get_signed_url(&attachment.s3_key, None).await?)
    }

    pub async fn stream_attachment(
        &self,
        s3_key: &str,
        user: &User,
    ) -> Result<(TicketAttachment, ByteStream), ServiceError> {
        let attachment = self.resolve_attachment(s3_key, user).await?;
        let stream = self.storage.get_file_stream(&attachment.s3_key).await?;

        Ok((attachment, stream))
    }

    /// Admin-side attachment inspection. Storage deletion is best-effort,
    /// so the object may be gone while the row survives (or the reverse);
    /// this reports both sides.
    pub async fn inspect_attachment(
        &self,
        s3_key: &str,
        user: &User,
    ) -> Result<(TicketAttachment, bool, Option<FileMetadata>), ServiceError> {
        self.require_admin(user)?;

        let attachment = self.resolve_attachment(s3_key, user).await?;
        let exists = self.storage.file_exists(&attachment.s3_key).await?;
        let metadata = if exists {
            Some(self.storage.get_file_metadata(&attachment.s3_key).await?)
        } else {
            None
        };

        Ok((attachment, exists, metadata))
    }

    async fn resolve_attachment(
        &self,
        s3_key: &str,
        user: &User,
    ) -> Result<TicketAttachment, ServiceError> {
        let scope = ViewerScope::for_user(user);

        self.db_client
            .get_attachment_by_key(s3_key, scope)
            .await?
            .ok_or(ServiceError::AttachmentNotFound)
    }

    fn require_admin(&self, user: &User) -> Result<(), ServiceError> {
        if user.role != UserRole::Admin {
            return Err(ServiceError::Forbidden);
        }
        Ok(())
    }
}
