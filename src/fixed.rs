//! The fixed-file and fixed-buffer table lifecycle: the unregistration-notification callback
//! routed by resource tag.
//!
//! A slot's state machine is `vacant -> occupied(fd, tag?) -> occupied(fd', tag'?) -> vacant`,
//! driven entirely through the ring's register/update/unregister calls. The kernel, not this
//! module, is the source of truth for which tag belongs to which slot: it echoes the tag straight
//! back on the slot's unregistration completion, so this module only needs to hold the callback
//! that tag should reach.

/// One registered table's unregistration callback. The ring keeps one of these per kind (fd
/// table, buffer table); tags are opaque 32-bit values supplied at registration and echoed back
/// here when the slot is later replaced or the table torn down.
#[derive(Default)]
pub(crate) struct TagTable {
    callback: Option<Box<dyn FnMut(u32)>>,
}

impl TagTable {
    pub(crate) fn new() -> Self {
        TagTable { callback: None }
    }

    pub(crate) fn set_callback(&mut self, callback: impl FnMut(u32) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Invoked by the ring when a kind-1 or kind-2 tagged completion arrives; `tag` is the
    /// resource tag the kernel echoed back, not a slot index.
    pub(crate) fn notify(&mut self, tag: u32) {
        if let Some(cb) = self.callback.as_mut() {
            cb(tag);
        }
    }
}

/// The two fixed resource tables a ring maintains: one for registered files, one for registered
/// buffers. Each grows on registration, shrinks (slot-wise) on replacement or unregistration.
#[derive(Default)]
pub(crate) struct FixedTables {
    pub(crate) files: TagTable,
    pub(crate) buffers: TagTable,
}

impl FixedTables {
    pub(crate) fn new() -> Self {
        FixedTables {
            files: TagTable::new(),
            buffers: TagTable::new(),
        }
    }
}
