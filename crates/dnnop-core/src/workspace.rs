use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

// Workspace - Named, type-erased storage shared by the operators of a net
//
// Every operator input and output is a Blob in the workspace. A Blob can hold
// a value of any type; typed access checks the stored type at runtime. Blobs
// are shared handles (Arc<RwLock<..>>), so an operator resolves its blobs once
// at construction and sees every later write through them.

struct BlobValue {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// A named, type-erased value slot.
#[derive(Clone)]
pub struct Blob {
    name: Arc<str>,
    inner: Arc<RwLock<Option<BlobValue>>>,
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .finish()
    }
}

impl Blob {
    fn new(name: &str) -> Self {
        Blob {
            name: Arc::from(name),
            inner: Arc::new(RwLock::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<BlobValue>>> {
        self.inner
            .read()
            .map_err(|_| Error::msg(format!("blob '{}' lock poisoned", self.name)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<BlobValue>>> {
        self.inner
            .write()
            .map_err(|_| Error::msg(format!("blob '{}' lock poisoned", self.name)))
    }

    /// Name of the stored type, or `None` for an empty blob.
    pub fn type_name(&self) -> Option<&'static str> {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|v| v.type_name))
    }

    pub fn is_empty(&self) -> bool {
        self.type_name().is_none()
    }

    /// Whether the blob currently holds a `T`.
    pub fn is_type<T: 'static>(&self) -> bool {
        self.inner
            .read()
            .map(|guard| matches!(guard.as_ref(), Some(v) if v.value.is::<T>()))
            .unwrap_or(false)
    }

    /// Clone the stored `T` out of the blob.
    ///
    /// Values stored in blobs are expected to be cheap handles to shared
    /// storage, so the clone observes later writes.
    pub fn get<T: Clone + 'static>(&self) -> Result<T> {
        let guard = self.read()?;
        match guard.as_ref() {
            None => Err(Error::TypeMismatch {
                blob: self.name.to_string(),
                expected: std::any::type_name::<T>(),
                got: "<empty>",
            }),
            Some(v) => v
                .value
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| Error::TypeMismatch {
                    blob: self.name.to_string(),
                    expected: std::any::type_name::<T>(),
                    got: v.type_name,
                }),
        }
    }

    /// Like `get`, but an empty blob or one holding another type is first
    /// replaced by `T::default()`.
    pub fn get_mutable<T: Clone + Default + Send + Sync + 'static>(&self) -> Result<T> {
        let mut guard = self.write()?;
        let holds_t = matches!(guard.as_ref(), Some(v) if v.value.is::<T>());
        if !holds_t {
            if let Some(old) = guard.as_ref() {
                tracing::debug!(
                    blob = %self.name,
                    from = old.type_name,
                    to = std::any::type_name::<T>(),
                    "replacing blob contents with a new type"
                );
            }
            *guard = Some(BlobValue {
                value: Box::new(T::default()),
                type_name: std::any::type_name::<T>(),
            });
        }
        guard
            .as_ref()
            .and_then(|v| v.value.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| Error::msg(format!("blob '{}' lost its value", self.name)))
    }

    /// Store `value`, dropping whatever the blob held.
    pub fn reset<T: Send + Sync + 'static>(&self, value: T) -> Result<()> {
        *self.write()? = Some(BlobValue {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        });
        Ok(())
    }
}

/// Name-to-blob map shared by the operators of a net.
#[derive(Debug, Default)]
pub struct Workspace {
    blobs: HashMap<String, Blob>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the blob `name`, or return the existing one.
    pub fn create_blob(&mut self, name: &str) -> Blob {
        self.blobs
            .entry(name.to_string())
            .or_insert_with(|| Blob::new(name))
            .clone()
    }

    pub fn get_blob(&self, name: &str) -> Option<Blob> {
        self.blobs.get(name).cloned()
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    pub fn remove_blob(&mut self, name: &str) -> bool {
        self.blobs.remove(name).is_some()
    }

    /// All blob names, sorted.
    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.keys().cloned().collect();
        names.sort();
        names
    }
}
