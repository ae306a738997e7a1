#![no_std]
#![warn(missing_docs)]

//! `at90can-core` provides the essential abstractions that serve as a thin
//! integration layer between the platform independent [`at90can`] crate and
//! platform specific HAL or board support crates (in documentation also
//! referred to as _target HALs_).
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by target HALs.
//!
//! Integrators of this crate into any given target HAL are responsible for
//! soundness of trait implementations and conforming to their respective
//! safety prerequisites.
//!
//! [`at90can`]: <https://docs.rs/crate/at90can/>

pub use fugit;

/// Trait representing CAN peripheral identity
///
/// Types implementing this trait are expected to be used as marker types that
/// identify a specific instance of the CAN peripheral available on the
/// platform. A marker only conveys *where* the peripheral's register block is
/// located, not that it can be accessed; the latter is expressed by the
/// [`Dependencies`] trait.
///
/// The accessor is a function rather than an associated constant so that
/// host-side test doubles can point it at an in-memory register file;
/// MCU-side implementations return the same literal address they would have
/// used to initialize a constant (on AVR parts the controller's I/O block
/// base, e.g. `0xD8`).
///
/// # Safety
/// `CanId::address()` must return a pointer to the start of a valid, live CAN
/// controller register block laid out as `at90can` expects, and must return
/// the same pointer on every call.
///
/// # Examples
/// ```no_run
/// use at90can_core::CanId;
///
/// pub enum Can0 {}
///
/// unsafe impl CanId for Can0 {
///     fn address() -> *const () {
///         0xD8 as *const _
///     }
/// }
/// ```
pub unsafe trait CanId {
    /// Start address of the register block controlling the corresponding CAN
    /// peripheral
    fn address() -> *const ();
}

/// Trait representing CAN peripheral dependencies
///
/// Structs implementing [`Dependencies`] should
/// - enclose all object representable dependencies of [`CanId`] and release
///   them upon destruction
/// - be constructible only when it is safe and sound to interact with the CAN
///   peripheral (respective clocks and pins have been already configured)
/// - be a singleton (only a single instance of [`Dependencies`] for a
///   specific [`CanId`] must exist at the same time)
///
/// in order to prevent aliasing and guarantee that the abstractions provided
/// by [`at90can`] are sole owners of the peripheral.
///
/// # Safety
/// While a [`Dependencies`] type instance exists
/// - the CAN related clocks must not change
/// - the CAN TX/RX pin modes must not change
/// - the register block must not be accessed in other parts of the target
///   HAL nor be safely accessible by the application developer
///
/// [`at90can`]: <https://docs.rs/crate/at90can/>
pub unsafe trait Dependencies<Id: CanId> {
    /// Frequency of the clock feeding the CAN controller.
    ///
    /// The controller samples and signals directly off this clock; the bit
    /// timing presets in `at90can` are generated against a fixed frequency
    /// and construction fails if this reports anything else.
    fn can_clock(&self) -> fugit::HertzU32;
}
