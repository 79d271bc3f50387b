#[cfg(target_arch = "x86_64")]
include!("sys_x86_64.rs");

#[cfg(target_arch = "aarch64")]
include!("sys_aarch64.rs");

#[cfg(target_arch = "riscv64")]
include!("sys_riscv64.rs");

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")))]
include!("sys_x86_64.rs");
