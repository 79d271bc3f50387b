pub const __NR_io_uring_setup: libc::c_long = 425;
pub const __NR_io_uring_enter: libc::c_long = 426;
pub const __NR_io_uring_register: libc::c_long = 427;

include!("sys_common.rs");
