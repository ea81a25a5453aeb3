//! Snapshot-isolated transactions over the RAM storage.
//!
//! A transaction pins the container that was current when it began. Writes
//! derive new containers privately; nothing is visible to other transactions
//! until commit publishes the final container with a compare-and-swap
//! against the pinned one.

use std::cell::RefCell;
use std::sync::Arc;

use bytes::Bytes;
use ers_foundation::{EntityId, Error, ErrorContext, ErrorKind, Result, TypeId};
use tracing::{debug, trace, warn};

use crate::api::{Entity, EntityIterable, FindOption, Transaction};
use crate::container::DataContainer;
use crate::storage::RamEntityRelationshipStorage;

#[derive(Debug)]
struct TxnState {
    container: Arc<DataContainer>,
    /// Data was written.
    dirty: bool,
    /// A query built a value index.
    index_updated: bool,
}

/// A transaction of a [`RamEntityRelationshipStorage`].
///
/// Not `Sync`: a transaction belongs to one thread. Open one per thread.
#[derive(Debug)]
pub struct RamTransaction {
    storage: RamEntityRelationshipStorage,
    origin: Arc<DataContainer>,
    readonly: bool,
    state: RefCell<Option<TxnState>>,
}

impl RamTransaction {
    pub(crate) fn new(storage: RamEntityRelationshipStorage, readonly: bool) -> Self {
        let origin = storage.current();
        Self {
            state: RefCell::new(Some(TxnState {
                container: Arc::clone(&origin),
                dirty: false,
                index_updated: false,
            })),
            storage,
            origin,
            readonly,
        }
    }

    /// Returns the container this transaction currently reads from.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    pub fn container(&self) -> Result<Arc<DataContainer>> {
        self.state
            .borrow()
            .as_ref()
            .map(|state| Arc::clone(&state.container))
            .ok_or_else(Error::transaction_finished)
    }

    fn writable(&self, operation: &str) -> Result<Arc<DataContainer>> {
        let container = self.container()?;
        if self.readonly {
            return Err(Error::new(ErrorKind::ReadonlyTransaction)
                .with_context(ErrorContext::new().with_operation(operation)));
        }
        Ok(container)
    }

    fn install(&self, next: DataContainer, dirty: bool) {
        if let Some(state) = self.state.borrow_mut().as_mut() {
            state.container = Arc::new(next);
            if dirty {
                state.dirty = true;
            } else {
                state.index_updated = true;
            }
        }
    }

    /// Applies an entity-scoped write. Returns whether anything changed.
    fn write_entity(
        &self,
        operation: &str,
        id: EntityId,
        name: Option<&str>,
        f: impl FnOnce(&DataContainer) -> Result<Option<DataContainer>>,
    ) -> Result<bool> {
        let container = self.writable(operation)?;
        let context = || {
            let context = ErrorContext::new().with_operation(operation).with_entity(id);
            match name {
                Some(name) => context.with_attribute(name),
                None => context,
            }
        };
        ensure_exists(&container, id).map_err(|err| err.with_context(context()))?;
        let next = f(&container).map_err(|err| {
            if err.context.is_some() {
                err
            } else {
                err.with_context(context())
            }
        })?;
        match next {
            Some(next) => {
                self.install(next, true);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs an entity-scoped read.
    fn read_entity<T>(
        &self,
        operation: &str,
        id: EntityId,
        f: impl FnOnce(&DataContainer) -> Result<T>,
    ) -> Result<T> {
        let container = self.container()?;
        ensure_exists(&container, id).map_err(|err| {
            err.with_context(ErrorContext::new().with_operation(operation).with_entity(id))
        })?;
        f(&container)
    }

    fn type_names(
        &self,
        type_name: &str,
        f: impl FnOnce(&DataContainer, TypeId) -> Vec<String>,
    ) -> Result<Vec<String>> {
        let container = self.container()?;
        Ok(container
            .type_id(type_name)
            .map(|type_id| f(&container, type_id))
            .unwrap_or_default())
    }
}

/// Folds staged writes, keeping the container's identity if there are none.
fn committed(container: Arc<DataContainer>) -> Arc<DataContainer> {
    if container.is_mutable() {
        Arc::new(container.commit())
    } else {
        container
    }
}

fn ensure_exists(container: &DataContainer, id: EntityId) -> Result<()> {
    if container.entity_exists(id) {
        Ok(())
    } else {
        Err(Error::non_existing_entity(id))
    }
}

impl Transaction for RamTransaction {
    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn is_finished(&self) -> bool {
        self.state.borrow().is_none()
    }

    fn new_entity(&self, type_name: &str) -> Result<Entity<'_, Self>> {
        let container = self.writable("new entity")?;
        let (registered, type_id) = container.get_or_allocate_type_id(type_name)?;
        let base = registered.as_ref().unwrap_or(&*container);
        let (next, instance_id) = base.allocate_instance_id(type_id)?;
        self.install(next, true);
        let id = EntityId::new(type_id, instance_id);
        trace!(entity = %id, type_name, "created entity");
        Ok(Entity::new(self, id))
    }

    fn entity(&self, id: EntityId) -> Result<Option<Entity<'_, Self>>> {
        Ok(self
            .entity_exists(id)?
            .then(|| Entity::new(self, id)))
    }

    fn entity_exists(&self, id: EntityId) -> Result<bool> {
        Ok(self.container()?.entity_exists(id))
    }

    fn delete_entity(&self, id: EntityId) -> Result<()> {
        self.write_entity("delete entity", id, None, |c| c.delete_entity(id))
            .map(|_| ())
    }

    fn type_id(&self, type_name: &str) -> Result<Option<TypeId>> {
        Ok(self.container()?.type_id(type_name))
    }

    fn all(&self, type_name: &str) -> Result<EntityIterable> {
        let container = self.container()?;
        Ok(container
            .type_id(type_name)
            .map(|type_id| EntityIterable::from_instances(type_id, container.all(type_id)))
            .unwrap_or_default())
    }

    fn find(
        &self,
        type_name: &str,
        property_name: &str,
        option: FindOption,
        value: &[u8],
    ) -> Result<EntityIterable> {
        let container = self.container()?;
        let Some(type_id) = container.type_id(type_name) else {
            return Ok(EntityIterable::empty());
        };
        let (built, ids) = container.find(type_id, property_name, option, value);
        if let Some(next) = built {
            self.install(next, false);
        }
        Ok(EntityIterable::from_instances(type_id, ids))
    }

    fn property_names(&self, type_name: &str) -> Result<Vec<String>> {
        self.type_names(type_name, DataContainer::property_names)
    }

    fn blob_names(&self, type_name: &str) -> Result<Vec<String>> {
        self.type_names(type_name, DataContainer::blob_names)
    }

    fn link_names(&self, type_name: &str) -> Result<Vec<String>> {
        self.type_names(type_name, DataContainer::link_names)
    }

    fn drop_all(&self) -> Result<()> {
        if self.writable("drop all")?.is_immutable() {
            return Err(Error::container_immutable("drop all"));
        }
        self.install(DataContainer::new(), true);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let state = self
            .state
            .borrow_mut()
            .take()
            .ok_or_else(Error::transaction_finished)?;
        if state.dirty {
            if !self.storage.compare_and_swap(&self.origin, committed(state.container)) {
                debug!("transaction conflicts with a concurrent commit");
                return Err(Error::conflicting_transaction());
            }
            debug!("committed transaction");
        } else if state.index_updated && self.storage.settings().persist_query_indexes {
            let published = self
                .storage
                .compare_and_swap(&self.origin, committed(state.container));
            trace!(published, "published query-built value indexes");
        }
        Ok(())
    }

    fn abort(&self) {
        self.state.borrow_mut().take();
    }

    fn get_property(&self, id: EntityId, name: &str) -> Result<Option<Bytes>> {
        self.read_entity("get property", id, |c| Ok(c.get_property(id, name)))
    }

    fn set_property(&self, id: EntityId, name: &str, value: Option<Bytes>) -> Result<()> {
        self.write_entity("set property", id, Some(name), |c| {
            c.set_property(id, name, value)
        })
        .map(|_| ())
    }

    fn get_blob(&self, id: EntityId, name: &str) -> Result<Option<Bytes>> {
        self.read_entity("get blob", id, |c| Ok(c.get_blob(id, name)))
    }

    fn set_blob(&self, id: EntityId, name: &str, value: Option<Bytes>) -> Result<()> {
        self.write_entity("set blob", id, Some(name), |c| c.set_blob(id, name, value))
            .map(|_| ())
    }

    fn links(&self, id: EntityId, name: &str) -> Result<EntityIterable> {
        self.read_entity("get links", id, |c| {
            c.links(id, name).map(EntityIterable::from_iter)
        })
    }

    fn add_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<bool> {
        self.write_entity("add link", id, Some(name), |c| {
            ensure_exists(c, target)?;
            c.add_link(id, name, target)
        })
    }

    fn delete_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<bool> {
        self.write_entity("delete link", id, Some(name), |c| c.delete_link(id, name, target))
    }
}

impl Drop for RamTransaction {
    fn drop(&mut self) {
        if let Some(state) = self.state.get_mut().take() {
            if state.dirty {
                warn!("dropped a transaction with uncommitted writes; aborting");
            }
        }
    }
}
