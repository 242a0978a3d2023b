use crate::{
    entities::customer_address,
    errors::ServiceError,
    events::{Event, EventSender},
    models::address::Address,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, Unchanged,
};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Input for creating an address.
#[derive(Debug, Clone, Validate)]
pub struct NewAddress {
    pub owner_id: Uuid,
    #[validate(length(min = 1, message = "Recipient is required"))]
    pub recipient: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    pub province: String,
    pub postal_code: String,
    #[validate(length(min = 2, max = 2, message = "Country code must be 2 characters"))]
    pub country_code: String,
    pub is_default: bool,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AddressUpdate {
    pub recipient: Option<String>,
    pub phone: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub is_default: Option<bool>,
}

/// Persistence boundary for addresses.
///
/// `promote_default` is the one operation the default invariant depends on:
/// it clears every sibling default and sets the target in a single atomic
/// step (one transaction, or one lock scope), never as two separate calls.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// All addresses of an owner, most-recently-created first.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Address>, ServiceError>;

    async fn get(&self, address_id: Uuid) -> Result<Option<Address>, ServiceError>;

    async fn insert(&self, address: Address) -> Result<Address, ServiceError>;

    async fn update(&self, address: Address) -> Result<Address, ServiceError>;

    async fn delete(&self, address_id: Uuid) -> Result<(), ServiceError>;

    /// Atomically makes `address_id` the owner's only default.
    async fn promote_default(&self, owner_id: Uuid, address_id: Uuid) -> Result<(), ServiceError>;
}

/// sea-orm-backed address store.
pub struct SeaOrmAddressStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmAddressStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressStore for SeaOrmAddressStore {
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Address>, ServiceError> {
        let models = customer_address::Entity::find()
            .filter(customer_address::Column::OwnerId.eq(owner_id))
            .order_by_desc(customer_address::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(models.into_iter().map(Address::from).collect())
    }

    async fn get(&self, address_id: Uuid) -> Result<Option<Address>, ServiceError> {
        let model = customer_address::Entity::find_by_id(address_id)
            .one(&*self.db)
            .await?;
        Ok(model.map(Address::from))
    }

    async fn insert(&self, address: Address) -> Result<Address, ServiceError> {
        let active = customer_address::ActiveModel {
            id: Set(address.id),
            owner_id: Set(address.owner_id),
            recipient: Set(address.recipient),
            phone: Set(address.phone),
            line1: Set(address.line1),
            line2: Set(address.line2),
            city: Set(address.city),
            province: Set(address.province),
            postal_code: Set(address.postal_code),
            country_code: Set(address.country_code),
            is_default: Set(address.is_default),
            created_at: Set(address.created_at),
            updated_at: Set(address.updated_at),
        };
        let inserted = active.insert(&*self.db).await?;
        Ok(inserted.into())
    }

    async fn update(&self, address: Address) -> Result<Address, ServiceError> {
        let active = customer_address::ActiveModel {
            id: Unchanged(address.id),
            owner_id: Set(address.owner_id),
            recipient: Set(address.recipient),
            phone: Set(address.phone),
            line1: Set(address.line1),
            line2: Set(address.line2),
            city: Set(address.city),
            province: Set(address.province),
            postal_code: Set(address.postal_code),
            country_code: Set(address.country_code),
            is_default: Set(address.is_default),
            created_at: Set(address.created_at),
            updated_at: Set(address.updated_at),
        };
        let updated = active.update(&*self.db).await?;
        Ok(updated.into())
    }

    async fn delete(&self, address_id: Uuid) -> Result<(), ServiceError> {
        customer_address::Entity::delete_by_id(address_id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn promote_default(&self, owner_id: Uuid, address_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        // Clear-then-set inside one transaction; the clear tolerates there
        // being no current default.
        customer_address::Entity::update_many()
            .col_expr(customer_address::Column::IsDefault, Expr::value(false))
            .col_expr(
                customer_address::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(customer_address::Column::OwnerId.eq(owner_id))
            .filter(customer_address::Column::Id.ne(address_id))
            .exec(&txn)
            .await?;

        let updated = customer_address::Entity::update_many()
            .col_expr(customer_address::Column::IsDefault, Expr::value(true))
            .col_expr(
                customer_address::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(customer_address::Column::Id.eq(address_id))
            .filter(customer_address::Column::OwnerId.eq(owner_id))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Address {} not found",
                address_id
            )));
        }

        txn.commit().await?;
        Ok(())
    }
}

/// In-memory address store. Insertion order doubles as creation order, so
/// listing is deterministic even when timestamps collide.
#[derive(Default)]
pub struct InMemoryAddressStore {
    inner: Mutex<Vec<Address>>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Address>>, ServiceError> {
        self.inner
            .lock()
            .map_err(|_| ServiceError::InternalError("Address store lock poisoned".to_string()))
    }
}

#[async_trait]
impl AddressStore for InMemoryAddressStore {
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Address>, ServiceError> {
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .rev()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get(&self, address_id: Uuid) -> Result<Option<Address>, ServiceError> {
        let guard = self.lock()?;
        Ok(guard.iter().find(|a| a.id == address_id).cloned())
    }

    async fn insert(&self, address: Address) -> Result<Address, ServiceError> {
        let mut guard = self.lock()?;
        guard.push(address.clone());
        Ok(address)
    }

    async fn update(&self, address: Address) -> Result<Address, ServiceError> {
        let mut guard = self.lock()?;
        let slot = guard
            .iter_mut()
            .find(|a| a.id == address.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address.id)))?;
        *slot = address.clone();
        Ok(address)
    }

    async fn delete(&self, address_id: Uuid) -> Result<(), ServiceError> {
        let mut guard = self.lock()?;
        guard.retain(|a| a.id != address_id);
        Ok(())
    }

    async fn promote_default(&self, owner_id: Uuid, address_id: Uuid) -> Result<(), ServiceError> {
        // Single lock scope: clear and set are indivisible.
        let mut guard = self.lock()?;
        if !guard.iter().any(|a| a.id == address_id && a.owner_id == owner_id) {
            return Err(ServiceError::NotFound(format!(
                "Address {} not found",
                address_id
            )));
        }
        for address in guard.iter_mut().filter(|a| a.owner_id == owner_id) {
            address.is_default = address.id == address_id;
            address.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Enforces the single-default invariant across address operations.
///
/// Every operation returns the post-operation address list so callers
/// observe true state rather than trusting the attempted mutation.
#[derive(Clone)]
pub struct AddressService {
    store: Arc<dyn AddressStore>,
    events: Arc<EventSender>,
}

impl AddressService {
    pub fn new(store: Arc<dyn AddressStore>, events: Arc<EventSender>) -> Self {
        Self { store, events }
    }

    #[instrument(skip(self, input), fields(owner_id = %input.owner_id))]
    pub async fn create(&self, input: NewAddress) -> Result<Vec<Address>, ServiceError> {
        input.validate()?;

        let existing = self.store.list(input.owner_id).await?;
        let address_id = Uuid::new_v4();
        let now = Utc::now();

        // The owner's first address is always the default, whatever was
        // requested.
        let first = existing.is_empty();
        let wants_default = input.is_default;

        let address = Address {
            id: address_id,
            owner_id: input.owner_id,
            recipient: input.recipient,
            phone: input.phone,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            province: input.province,
            postal_code: input.postal_code,
            country_code: input.country_code,
            is_default: first,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(address).await?;

        if !first && wants_default {
            self.store
                .promote_default(input.owner_id, address_id)
                .await?;
            self.events
                .send_or_log(Event::DefaultAddressChanged {
                    owner_id: input.owner_id,
                    address_id,
                })
                .await;
        }

        self.events.send_or_log(Event::AddressCreated(address_id)).await;
        info!(address_id = %address_id, "Address created");
        self.store.list(input.owner_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        address_id: Uuid,
        input: AddressUpdate,
    ) -> Result<Vec<Address>, ServiceError> {
        let current = self
            .store
            .get(address_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        let owner_id = current.owner_id;
        let was_default = current.is_default;

        let mut updated = current;
        if let Some(recipient) = input.recipient {
            updated.recipient = recipient;
        }
        if let Some(phone) = input.phone {
            updated.phone = phone;
        }
        if let Some(line1) = input.line1 {
            updated.line1 = line1;
        }
        if let Some(line2) = input.line2 {
            updated.line2 = Some(line2);
        }
        if let Some(city) = input.city {
            updated.city = city;
        }
        if let Some(province) = input.province {
            updated.province = province;
        }
        if let Some(postal_code) = input.postal_code {
            updated.postal_code = postal_code;
        }
        if let Some(country_code) = input.country_code {
            updated.country_code = country_code;
        }
        updated.updated_at = Utc::now();

        self.store.update(updated).await?;

        // Setting default on a non-default address promotes it; requesting
        // default=false is ignored, the invariant only moves defaults, it
        // never removes the last one.
        if input.is_default == Some(true) && !was_default {
            self.store.promote_default(owner_id, address_id).await?;
            self.events
                .send_or_log(Event::DefaultAddressChanged {
                    owner_id,
                    address_id,
                })
                .await;
        }

        self.events.send_or_log(Event::AddressUpdated(address_id)).await;
        self.store.list(owner_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, address_id: Uuid) -> Result<Vec<Address>, ServiceError> {
        let current = self
            .store
            .get(address_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
        let owner_id = current.owner_id;
        let was_default = current.is_default;

        self.store.delete(address_id).await?;

        // Deleting the default promotes the most-recently-created survivor.
        if was_default {
            let remaining = self.store.list(owner_id).await?;
            if let Some(successor) = remaining.first() {
                self.store.promote_default(owner_id, successor.id).await?;
                self.events
                    .send_or_log(Event::DefaultAddressChanged {
                        owner_id,
                        address_id: successor.id,
                    })
                    .await;
            }
        }

        self.events.send_or_log(Event::AddressDeleted(address_id)).await;
        info!(address_id = %address_id, "Address deleted");
        self.store.list(owner_id).await
    }

    #[instrument(skip(self))]
    pub async fn set_default(
        &self,
        owner_id: Uuid,
        address_id: Uuid,
    ) -> Result<Vec<Address>, ServiceError> {
        self.store.promote_default(owner_id, address_id).await?;
        self.events
            .send_or_log(Event::DefaultAddressChanged {
                owner_id,
                address_id,
            })
            .await;
        self.store.list(owner_id).await
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<Address>, ServiceError> {
        self.store.list(owner_id).await
    }
}
