//! Helper macros and small utilities shared across the crate.
//!
//! - `getter_fn!` / `with_field_fn!` generate reference getters and
//!   builder-style `with_*` setters.
//! - [`n_threads`] reads the `VARSTORE_NUM_THREADS` override.

/// Number of worker threads requested through `VARSTORE_NUM_THREADS`, or the
/// number of available cores.
pub fn n_threads() -> usize {
    std::env::var("VARSTORE_NUM_THREADS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

#[macro_export]
macro_rules! getter_fn {
    ($field_name: ident, $field_type: ty) => {
        #[cfg_attr(coverage_nightly, coverage(off))]
        pub fn $field_name(&self) -> &$field_type {
            &self.$field_name
        }
    };
}
pub use getter_fn;

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            #[cfg_attr(coverage_nightly, coverage(off))]
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
                self.$field_name = value;
                self
            }
        }
    };
}
pub use with_field_fn;
