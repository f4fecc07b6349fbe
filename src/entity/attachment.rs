// =============================================================================
// ATTACHMENTS
// =============================================================================
// Files (datasheets, pictures, ...) attached to a part. Each attachment has
// a type, which is a structural element (AttachmentType).
// File storage itself is external; only the stored filename is handled here.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::entity::structural::{ensure_reference_exists, NodeKind};
use crate::error::{AppError, AppResult};
use crate::store::Storage;

const PICTURE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: i64,
    pub part_id: i64,
    pub type_id: i64,
    pub name: String,
    pub filename: String,
    pub show_in_table: bool,
}

impl AttachmentRecord {
    /// Guessed from the file extension
    pub fn is_picture(&self) -> bool {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| PICTURE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub part_id: i64,
    pub type_id: i64,
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub show_in_table: bool,
}

pub async fn load_for_part(store: &dyn Storage, part_id: i64) -> AppResult<Vec<AttachmentRecord>> {
    let mut records = store.fetch_attachments(part_id).await?;
    records.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
    Ok(records)
}

/// Attaches a file to a part. The attachment type and the part must exist.
pub async fn create(store: &dyn Storage, new: NewAttachment) -> AppResult<AttachmentRecord> {
    let name = super::normalize_name("name", &new.name)?;
    ensure_reference_exists(store, NodeKind::AttachmentType, Some(new.type_id)).await?;
    if store.fetch_part(new.part_id).await?.is_none() {
        return Err(AppError::not_found("Part", new.part_id));
    }
    store.insert_attachment(&NewAttachment { name, ..new }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: &str) -> AttachmentRecord {
        AttachmentRecord {
            id: 1,
            part_id: 1,
            type_id: 1,
            name: "file".into(),
            filename: filename.into(),
            show_in_table: false,
        }
    }

    #[test]
    fn test_is_picture() {
        assert!(attachment("media/photo.JPG").is_picture());
        assert!(attachment("/data/img.png").is_picture());
        assert!(!attachment("datasheet.pdf").is_picture());
        assert!(!attachment("README").is_picture());
    }

    #[tokio::test]
    async fn test_create_requires_a_real_attachment_type() {
        use crate::entity::part::NewPart;
        use crate::entity::structural::NewNode;
        use crate::error::ErrorKind;
        use crate::store::MemoryStorage;

        let store = MemoryStorage::new();
        let part = store.insert_part(&NewPart::named("NE555")).await.unwrap();
        let new = |type_id| NewAttachment {
            part_id: part.id,
            type_id,
            name: "  Datasheet ".into(),
            filename: "ne555.pdf".into(),
            show_in_table: true,
        };

        let err = create(&store, new(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.fetch_attachments(part.id).await.unwrap().is_empty());

        let datasheets = store
            .insert_node(NodeKind::AttachmentType, &NewNode::new(0, "Datasheets"))
            .await
            .unwrap();
        let record = create(&store, new(datasheets.id)).await.unwrap();
        assert_eq!(record.name, "Datasheet");
        assert_eq!(load_for_part(&store, part.id).await.unwrap(), vec![record]);
    }
}
