//! Catalog store - item and service listings
//!
//! Leaf data provider for the order core. Resolves a [`ListingRef`] into
//! its owner and price exactly once, before order creation.

use crate::error::MarketError;
use crate::identity::IdentityStore;
use crate::models::{Item, ListingRef, Service};
use crate::MarketResult;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Item creation request
#[derive(Debug, Clone)]
pub struct AddItemRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub owner_id: Uuid,
}

/// Service creation request
#[derive(Debug, Clone)]
pub struct AddServiceRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub provider_id: Uuid,
}

/// A listing resolved to its owner and price
#[derive(Debug, Clone)]
pub struct ResolvedListing {
    pub listing: ListingRef,
    pub title: String,
    pub price: f64,
    pub owner_id: Uuid,
}

/// In-memory catalog store (a database in production)
pub struct CatalogStore {
    items: Arc<RwLock<HashMap<Uuid, Item>>>,
    services: Arc<RwLock<HashMap<Uuid, Service>>>,
    identity: Arc<IdentityStore>,
}

impl CatalogStore {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            services: Arc::new(RwLock::new(HashMap::new())),
            identity,
        }
    }

    /// Add an item listing
    pub async fn add_item(&self, request: AddItemRequest) -> MarketResult<Item> {
        self.validate_listing(&request.title, request.price, request.owner_id)
            .await?;

        let item = Item::new(
            request.title,
            request.description,
            request.price,
            request.owner_id,
        );
        self.items.write().await.insert(item.id, item.clone());

        info!("Added item: {}", item.id);

        Ok(item)
    }

    /// Add a service listing
    pub async fn add_service(&self, request: AddServiceRequest) -> MarketResult<Service> {
        self.validate_listing(&request.title, request.price, request.provider_id)
            .await?;

        let service = Service::new(
            request.title,
            request.description,
            request.price,
            request.provider_id,
        );
        self.services
            .write()
            .await
            .insert(service.id, service.clone());

        info!("Added service: {}", service.id);

        Ok(service)
    }

    /// Get an item by ID
    pub async fn get_item(&self, item_id: Uuid) -> MarketResult<Item> {
        self.items
            .read()
            .await
            .get(&item_id)
            .cloned()
            .ok_or_else(|| MarketError::not_found(format!("Item {} not found", item_id)))
    }

    /// Get a service by ID
    pub async fn get_service(&self, service_id: Uuid) -> MarketResult<Service> {
        self.services
            .read()
            .await
            .get(&service_id)
            .cloned()
            .ok_or_else(|| MarketError::not_found(format!("Service {} not found", service_id)))
    }

    /// Resolve a listing reference into its owner and price
    pub async fn resolve_listing(&self, listing: ListingRef) -> MarketResult<ResolvedListing> {
        match listing {
            ListingRef::Item(id) => {
                let item = self.get_item(id).await?;
                Ok(ResolvedListing {
                    listing,
                    title: item.title,
                    price: item.price,
                    owner_id: item.owner_id,
                })
            }
            ListingRef::Service(id) => {
                let service = self.get_service(id).await?;
                Ok(ResolvedListing {
                    listing,
                    title: service.title,
                    price: service.price,
                    owner_id: service.provider_id,
                })
            }
        }
    }

    /// Get all listings owned by a user
    pub async fn listings_for_user(&self, user_id: Uuid) -> MarketResult<Vec<ResolvedListing>> {
        let mut results = Vec::new();

        for item in self.items.read().await.values() {
            if item.owner_id == user_id {
                results.push(ResolvedListing {
                    listing: ListingRef::Item(item.id),
                    title: item.title.clone(),
                    price: item.price,
                    owner_id: item.owner_id,
                });
            }
        }
        for service in self.services.read().await.values() {
            if service.provider_id == user_id {
                results.push(ResolvedListing {
                    listing: ListingRef::Service(service.id),
                    title: service.title.clone(),
                    price: service.price,
                    owner_id: service.provider_id,
                });
            }
        }

        Ok(results)
    }

    /// Case-insensitive title search across items and services
    pub async fn search(&self, query: &str) -> MarketResult<Vec<ResolvedListing>> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();

        for item in self.items.read().await.values() {
            if item.title.to_lowercase().contains(&needle) {
                results.push(ResolvedListing {
                    listing: ListingRef::Item(item.id),
                    title: item.title.clone(),
                    price: item.price,
                    owner_id: item.owner_id,
                });
            }
        }
        for service in self.services.read().await.values() {
            if service.title.to_lowercase().contains(&needle) {
                results.push(ResolvedListing {
                    listing: ListingRef::Service(service.id),
                    title: service.title.clone(),
                    price: service.price,
                    owner_id: service.provider_id,
                });
            }
        }

        Ok(results)
    }

    async fn validate_listing(&self, title: &str, price: f64, owner_id: Uuid) -> MarketResult<()> {
        if title.trim().is_empty() {
            return Err(MarketError::validation("Title cannot be empty"));
        }
        if price <= 0.0 {
            return Err(MarketError::validation("Price must be greater than 0"));
        }

        let owner = self.identity.get_user(owner_id).await?;
        if !owner.is_active {
            return Err(MarketError::validation("Listing owner is deactivated"));
        }
        if !owner.is_seller {
            return Err(MarketError::validation(
                "Only seller accounts can create listings",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RegisterUserRequest;

    async fn seller(identity: &IdentityStore) -> Uuid {
        identity
            .register_user(RegisterUserRequest {
                email: format!("seller-{}@example.com", Uuid::new_v4()),
                phone: None,
                name: "Seller".to_string(),
                is_seller: true,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn resolve_listing_returns_owner() {
        let identity = Arc::new(IdentityStore::new());
        let catalog = CatalogStore::new(identity.clone());
        let owner_id = seller(&identity).await;

        let item = catalog
            .add_item(AddItemRequest {
                title: "Snowboard".to_string(),
                description: None,
                price: 1500.0,
                owner_id,
            })
            .await
            .unwrap();

        let resolved = catalog
            .resolve_listing(ListingRef::Item(item.id))
            .await
            .unwrap();
        assert_eq!(resolved.owner_id, owner_id);
        assert_eq!(resolved.price, 1500.0);
    }

    #[tokio::test]
    async fn non_seller_cannot_list() {
        let identity = Arc::new(IdentityStore::new());
        let catalog = CatalogStore::new(identity.clone());
        let buyer = identity
            .register_user(RegisterUserRequest {
                email: "buyer@example.com".to_string(),
                phone: None,
                name: "Buyer".to_string(),
                is_seller: false,
            })
            .await
            .unwrap();

        let result = catalog
            .add_item(AddItemRequest {
                title: "Snowboard".to_string(),
                description: None,
                price: 1500.0,
                owner_id: buyer.id,
            })
            .await;
        assert!(matches!(result, Err(MarketError::Validation(_))));
    }

    #[tokio::test]
    async fn search_matches_items_and_services() {
        let identity = Arc::new(IdentityStore::new());
        let catalog = CatalogStore::new(identity.clone());
        let owner_id = seller(&identity).await;

        catalog
            .add_item(AddItemRequest {
                title: "Winter Jacket".to_string(),
                description: None,
                price: 300.0,
                owner_id,
            })
            .await
            .unwrap();
        catalog
            .add_service(AddServiceRequest {
                title: "Jacket repair".to_string(),
                description: None,
                price: 40.0,
                provider_id: owner_id,
            })
            .await
            .unwrap();

        let results = catalog.search("jacket").await.unwrap();
        assert_eq!(results.len(), 2);

        let missing = catalog.search("kayak").await.unwrap();
        assert!(missing.is_empty());
    }
}
