//! # Debug printing and instrumentation
//!
//! All output goes through the `log` facade, so the messages end up wherever the installed
//! logger sends them, for example [crate::log::blocking].
//!
//! The macro families can be switched off at compile time with the `dbg-print`, `dbgx-print`
//! and `param-check` features. Disabled macros still type-check their arguments, but the
//! compiler removes them.
//!
//! The `dbgx_*` macros take a module bit as the first argument. A message is only printed if
//! that bit is also set in the run-time [module_mask].
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

#[doc(hidden)]
pub use ::log as __log;

#[doc(hidden)]
pub const DBG_PRINT_ENABLED: bool = cfg!(feature = "dbg-print");
#[doc(hidden)]
pub const DBGX_PRINT_ENABLED: bool = cfg!(feature = "dbgx-print");
#[doc(hidden)]
pub const PARAM_CHECK_ENABLED: bool = cfg!(feature = "param-check");

/// Number of bytes shown in one row of a memory dump.
pub const DUMP_ROW_BYTES: usize = 16;

static MODULE_MASK: AtomicU32 = AtomicU32::new(u32::MAX);

pub fn set_module_mask(mask: u32) {
    MODULE_MASK.store(mask, Ordering::Relaxed);
}

#[inline]
pub fn module_mask() -> u32 {
    MODULE_MASK.load(Ordering::Relaxed)
}

#[inline]
pub fn module_enabled(module_bit: u32) -> bool {
    module_bit & module_mask() != 0
}

#[macro_export]
macro_rules! dbg_print {
    ($($arg:tt)+) => {
        if $crate::dbg::DBG_PRINT_ENABLED {
            $crate::dbg::__log::debug!($($arg)+);
        }
    };
}

/// Like [dbg_print], prefixed with the module path and line of the call site.
#[macro_export]
macro_rules! dbg_print_line {
    ($($arg:tt)+) => {
        if $crate::dbg::DBG_PRINT_ENABLED {
            $crate::dbg::__log::debug!(
                "{}:{}: {}",
                module_path!(),
                line!(),
                format_args!($($arg)+)
            );
        }
    };
}

#[macro_export]
macro_rules! dbg_print_func_begin {
    ($name:expr) => {
        if $crate::dbg::DBG_PRINT_ENABLED {
            $crate::dbg::__log::debug!("{}::{}: begin", module_path!(), $name);
        }
    };
}

#[macro_export]
macro_rules! dbg_print_var {
    ($var:expr) => {
        if $crate::dbg::DBG_PRINT_ENABLED {
            $crate::dbg::__log::debug!("{} = {}", stringify!($var), $var);
        }
    };
}

#[macro_export]
macro_rules! dbg_print_var_hex {
    ($var:expr) => {
        if $crate::dbg::DBG_PRINT_ENABLED {
            $crate::dbg::__log::debug!("{} = {:#010x}", stringify!($var), $var);
        }
    };
}

#[macro_export]
macro_rules! dbg_print_var_non_zero {
    ($var:expr) => {
        if $crate::dbg::DBG_PRINT_ENABLED && $var != 0 {
            $crate::dbg::__log::debug!("{} = {}", stringify!($var), $var);
        }
    };
}

#[macro_export]
macro_rules! dbg_print_var_hex_non_zero {
    ($var:expr) => {
        if $crate::dbg::DBG_PRINT_ENABLED && $var != 0 {
            $crate::dbg::__log::debug!("{} = {:#010x}", stringify!($var), $var);
        }
    };
}

#[macro_export]
macro_rules! dbgx_print {
    ($module_bit:expr, $($arg:tt)+) => {
        if $crate::dbg::DBGX_PRINT_ENABLED && $crate::dbg::module_enabled($module_bit) {
            $crate::dbg::__log::debug!($($arg)+);
        }
    };
}

#[macro_export]
macro_rules! dbgx_print_line {
    ($module_bit:expr, $($arg:tt)+) => {
        if $crate::dbg::DBGX_PRINT_ENABLED && $crate::dbg::module_enabled($module_bit) {
            $crate::dbg::__log::debug!(
                "{}:{}: {}",
                module_path!(),
                line!(),
                format_args!($($arg)+)
            );
        }
    };
}

/// Returns `Err($err)` from the enclosing function if `$param < $min`.
#[macro_export]
macro_rules! param_min_check {
    ($param:expr, $min:expr, $err:expr) => {
        if $crate::dbg::PARAM_CHECK_ENABLED && $param < $min {
            $crate::dbg::__log::error!(
                "{}:{}: parameter {}: {} is less than {}",
                module_path!(),
                line!(),
                stringify!($param),
                $param,
                $min
            );
            return Err($err);
        }
    };
}

/// Returns `Err($err)` from the enclosing function if `$param > $max`.
#[macro_export]
macro_rules! param_max_check {
    ($param:expr, $max:expr, $err:expr) => {
        if $crate::dbg::PARAM_CHECK_ENABLED && $param > $max {
            $crate::dbg::__log::error!(
                "{}:{}: parameter {}: {} is greater than {}",
                module_path!(),
                line!(),
                stringify!($param),
                $param,
                $max
            );
            return Err($err);
        }
    };
}

/// Returns `Err($err)` from the enclosing function if `$param` is outside of `$min..=$max`.
#[macro_export]
macro_rules! param_limit_check {
    ($param:expr, $min:expr, $max:expr, $err:expr) => {
        if $crate::dbg::PARAM_CHECK_ENABLED && ($param < $min || $param > $max) {
            $crate::dbg::__log::error!(
                "{}:{}: parameter {}: {} is beyond limit {}..={}",
                module_path!(),
                line!(),
                stringify!($param),
                $param,
                $min,
                $max
            );
            return Err($err);
        }
    };
}

/// Unsigned integer types which can be shown in a memory dump.
pub trait DumpItem: Copy + fmt::LowerHex {
    /// Number of hex digits used for one item.
    const HEX_WIDTH: usize;
}

impl DumpItem for u8 {
    const HEX_WIDTH: usize = 2;
}

impl DumpItem for u16 {
    const HEX_WIDTH: usize = 4;
}

impl DumpItem for u32 {
    const HEX_WIDTH: usize = 8;
}

/// One row of a memory dump: the address of the first item followed by up to
/// [DUMP_ROW_BYTES] bytes worth of items.
#[derive(Debug, Clone, Copy)]
pub struct DumpRow<'a, T> {
    addr: usize,
    items: &'a [T],
}

impl<'a, T: DumpItem> DumpRow<'a, T> {
    #[inline]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[inline]
    pub const fn items(&self) -> &'a [T] {
        self.items
    }
}

impl<T: DumpItem> fmt::Display for DumpRow<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}:", self.addr)?;
        for item in self.items {
            write!(f, " {:0width$x}", item, width = T::HEX_WIDTH)?;
        }
        Ok(())
    }
}

/// Split `data`, which is located at `base_addr`, into dump rows.
pub fn dump_rows<T: DumpItem>(
    base_addr: usize,
    data: &[T],
) -> impl Iterator<Item = DumpRow<'_, T>> {
    let items_per_row = DUMP_ROW_BYTES / core::mem::size_of::<T>();
    data.chunks(items_per_row)
        .enumerate()
        .map(move |(idx, items)| DumpRow {
            addr: base_addr + idx * DUMP_ROW_BYTES,
            items,
        })
}

fn mem_dump<T: DumpItem>(base_addr: usize, data: &[T]) {
    for row in dump_rows(base_addr, data) {
        ::log::info!("{}", row);
    }
}

pub fn mem_word_dump(base_addr: usize, data: &[u32]) {
    mem_dump(base_addr, data)
}

pub fn mem_halfword_dump(base_addr: usize, data: &[u16]) {
    mem_dump(base_addr, data)
}

pub fn mem_byte_dump(base_addr: usize, data: &[u8]) {
    mem_dump(base_addr, data)
}
