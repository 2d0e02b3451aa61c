use std::sync::atomic::{AtomicI32, Ordering};

use rustc_hash::FxHashMap;

pub type HashMap<K, V> = FxHashMap<K, V>;

/// Arrival/spike times start at this sentinel so that time differences stay
/// far outside every STDP window without overflowing i64 arithmetic.
pub const TIME_NEVER: i64 = i64::MIN / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    FireUpdateOverflowD1,
    FireUpdateOverflowD2,
    CurrentUpdateGroupUnknown,
}

impl KernelError {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelError::FireUpdateOverflowD1 => "FIRE_UPDATE_OVERFLOW_D1",
            KernelError::FireUpdateOverflowD2 => "FIRE_UPDATE_OVERFLOW_D2",
            KernelError::CurrentUpdateGroupUnknown => "CURRENT_UPDATE_GROUP_UNKNOWN",
        }
    }

    fn code(&self) -> i32 {
        match self {
            KernelError::FireUpdateOverflowD1 => 1,
            KernelError::FireUpdateOverflowD2 => 2,
            KernelError::CurrentUpdateGroupUnknown => 3,
        }
    }

    fn from_code(code: i32) -> Option<KernelError> {
        match code {
            1 => Some(KernelError::FireUpdateOverflowD1),
            2 => Some(KernelError::FireUpdateOverflowD2),
            3 => Some(KernelError::CurrentUpdateGroupUnknown),
            _ => None,
        }
    }
}

/// Sticky error slot shared by all workers. The first kernel that fails wins;
/// later codes are ignored so the host sees the original cause.
#[derive(Debug, Default)]
pub struct ErrorFlag {
    code: AtomicI32,
}

impl ErrorFlag {
    pub fn new() -> Self {
        Self {
            code: AtomicI32::new(0),
        }
    }

    pub fn raise(&self, error: KernelError) {
        self.code
            .compare_exchange(0, error.code(), Ordering::AcqRel, Ordering::Acquire)
            .ok();
    }

    pub fn get(&self) -> Option<KernelError> {
        KernelError::from_code(self.code.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_distinct() {
        let codes = [
            KernelError::FireUpdateOverflowD1,
            KernelError::FireUpdateOverflowD2,
            KernelError::CurrentUpdateGroupUnknown,
        ];

        for error in codes {
            assert_eq!(KernelError::from_code(error.code()), Some(error));
        }

        assert_eq!(KernelError::from_code(0), None);
    }

    #[test]
    fn first_raised_error_sticks() {
        let flag = ErrorFlag::new();
        assert_eq!(flag.get(), None);

        flag.raise(KernelError::FireUpdateOverflowD2);
        flag.raise(KernelError::CurrentUpdateGroupUnknown);

        assert_eq!(flag.get(), Some(KernelError::FireUpdateOverflowD2));
    }
}
