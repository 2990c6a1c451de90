/// Decides how many of the currently available tokens a request takes.
///
/// Implementations must return a value no greater than `available`; the
/// bucket clamps anything larger and logs a warning. Any
/// `Fn(u64, u64) -> u64` closure is a policy.
pub trait Admission {
    fn admit(&self, requested: u64, available: u64) -> u64;
}

/// Grants the whole request or nothing. The default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllOrNothing;

impl Admission for AllOrNothing {
    #[inline]
    fn admit(&self, requested: u64, available: u64) -> u64 {
        if requested <= available { requested } else { 0 }
    }
}

/// Grants as much of the request as is available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Partial;

impl Admission for Partial {
    #[inline]
    fn admit(&self, requested: u64, available: u64) -> u64 {
        requested.min(available)
    }
}

impl<F> Admission for F
where
    F: Fn(u64, u64) -> u64,
{
    #[inline]
    fn admit(&self, requested: u64, available: u64) -> u64 {
        self(requested, available)
    }
}
