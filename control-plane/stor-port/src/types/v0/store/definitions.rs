/// Re-export the pstor types.
pub use pstor::{
    key_prefix, key_prefix_obj, ApiVersion, Error as StoreError, LocalStore, ObjectKey,
    StorableObject, StorableObjectType, Store, Transaction,
};
