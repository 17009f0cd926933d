//! Asset storage scoped to the owning user.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use folio_common::{Asset, AssetId, AssetPatch, FolioError, NewAsset, Result, UserId};

/// Storage for asset records.
///
/// Every operation is scoped to `owner`; another user's asset behaves as if
/// it did not exist.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// All of the owner's assets, newest first.
    async fn list(&self, owner: &UserId) -> Result<Vec<Asset>>;

    /// Validate and store a new asset.
    async fn create(&self, owner: &UserId, new: NewAsset) -> Result<Asset>;

    /// Apply a partial update and return the updated record.
    async fn update(&self, owner: &UserId, id: AssetId, patch: AssetPatch) -> Result<Asset>;

    /// Remove an asset.
    async fn delete(&self, owner: &UserId, id: AssetId) -> Result<()>;
}

/// Asset store held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryAssetStore {
    assets: Arc<DashMap<AssetId, Asset>>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a complete record as-is, after validation.
    pub fn insert(&self, asset: Asset) -> Result<()> {
        asset.validate()?;
        self.assets.insert(asset.id, asset);
        Ok(())
    }

    /// Create assets for `owner` from a JSON array of new-asset records.
    ///
    /// Nothing is stored unless every record is valid.
    pub async fn import_json(&self, owner: &UserId, json: &str) -> Result<Vec<Asset>> {
        let records: Vec<NewAsset> =
            serde_json::from_str(json).map_err(|e| FolioError::InvalidAsset {
                message: format!("malformed asset file: {}", e),
                field: None,
            })?;

        for (index, record) in records.iter().enumerate() {
            if let Err(e) = record.validate() {
                warn!(index, error = %e, "Rejected asset file");
                return Err(e);
            }
        }

        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.create(owner, record).await?);
        }
        Ok(created)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn list(&self, owner: &UserId) -> Result<Vec<Asset>> {
        let mut assets: Vec<Asset> = self
            .assets
            .iter()
            .filter(|entry| &entry.owner == owner)
            .map(|entry| entry.value().clone())
            .collect();

        assets.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });

        debug!(owner = %owner, count = assets.len(), "Listed assets");
        Ok(assets)
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    async fn create(&self, owner: &UserId, new: NewAsset) -> Result<Asset> {
        new.validate()?;

        let asset = Asset::from_new(owner.clone(), new);
        self.assets.insert(asset.id, asset.clone());

        info!(asset_id = %asset.id, owner = %owner, "Asset created");
        Ok(asset)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, owner: &UserId, id: AssetId, patch: AssetPatch) -> Result<Asset> {
        let mut entry = self
            .assets
            .get_mut(&id)
            .filter(|entry| &entry.owner == owner)
            .ok_or(FolioError::AssetNotFound(id))?;

        let mut updated = entry.value().clone();
        updated.apply(patch);
        updated.validate()?;

        *entry = updated.clone();

        info!(asset_id = %id, "Asset updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, owner: &UserId, id: AssetId) -> Result<()> {
        self.assets
            .remove_if(&id, |_, asset| &asset.owner == owner)
            .ok_or(FolioError::AssetNotFound(id))?;

        info!(asset_id = %id, "Asset deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_common::{AssetType, Currency, RiskLevel};
    use tokio_test::{assert_err, assert_ok};

    fn new_asset(name: &str, value: f64) -> NewAsset {
        NewAsset::new(name, AssetType::Stock, value, Currency::Usd, "USA", RiskLevel::Medium)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");

        let created = store.create(&owner, new_asset("VTI", 1000.0)).await.unwrap();
        let listed = store.list(&owner).await.unwrap();

        assert_eq!(listed, vec![created]);
        assert!(store.list(&UserId::new("user-2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");

        let mut older = Asset::from_new(owner.clone(), new_asset("older", 1.0));
        older.created_at -= chrono::Duration::days(1);
        let newer = Asset::from_new(owner.clone(), new_asset("newer", 1.0));
        store.insert(older).unwrap();
        store.insert(newer).unwrap();

        let names: Vec<_> = store
            .list(&owner)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_invalid_asset_rejected() {
        let store = InMemoryAssetStore::new();
        let result = store
            .create(&UserId::new("user-1"), new_asset("", 10.0))
            .await;

        assert!(matches!(result, Err(FolioError::InvalidAsset { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_scoped_to_owner() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");
        let asset = store.create(&owner, new_asset("VTI", 1000.0)).await.unwrap();

        let patch = AssetPatch {
            value: Some(1200.0),
            ..Default::default()
        };
        let result = store
            .update(&UserId::new("intruder"), asset.id, patch.clone())
            .await;
        assert_eq!(result, Err(FolioError::AssetNotFound(asset.id)));

        let updated = store.update(&owner, asset.id, patch).await.unwrap();
        assert_eq!(updated.value, 1200.0);
        assert!(updated.updated_at >= asset.updated_at);
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_record_unchanged() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");
        let asset = store.create(&owner, new_asset("VTI", 1000.0)).await.unwrap();

        let patch = AssetPatch {
            value: Some(-5.0),
            ..Default::default()
        };
        assert!(store.update(&owner, asset.id, patch).await.is_err());
        assert_eq!(store.list(&owner).await.unwrap()[0].value, 1000.0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");
        let asset = store.create(&owner, new_asset("VTI", 1000.0)).await.unwrap();

        assert_err!(store.delete(&UserId::new("intruder"), asset.id).await);
        assert_eq!(store.len(), 1);

        assert_ok!(store.delete(&owner, asset.id).await);
        assert!(store.is_empty());
        assert_err!(store.delete(&owner, asset.id).await);
    }

    #[tokio::test]
    async fn test_import_json() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");
        let json = r#"[
            {"name": "Savings", "type": "cash", "value": 5000, "currency": "EUR",
             "location": "Germany", "risk_level": "low"},
            {"name": "BTC", "type": "crypto", "value": 300, "currency": "USD",
             "location": "Online", "risk_level": "high", "annual_yield": 0}
        ]"#;

        let created = store.import_json(&owner, json).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].currency, Currency::Eur);

        assert_err!(store.import_json(&owner, "{").await);
    }

    #[tokio::test]
    async fn test_import_json_is_all_or_nothing() {
        let store = InMemoryAssetStore::new();
        let owner = UserId::new("user-1");
        let json = r#"[
            {"name": "Savings", "type": "cash", "value": 5000, "currency": "EUR",
             "location": "Germany", "risk_level": "low"},
            {"name": "  ", "type": "stock", "value": 10, "currency": "USD",
             "location": "USA", "risk_level": "high"},
            {"name": "BTC", "type": "crypto", "value": 300, "currency": "USD",
             "location": "Online", "risk_level": "high"}
        ]"#;

        let err = assert_err!(store.import_json(&owner, json).await);
        assert!(matches!(err, FolioError::InvalidAsset { field: Some(f), .. } if f == "name"));
        assert!(store.is_empty());
        assert!(store.list(&owner).await.unwrap().is_empty());
    }
}
