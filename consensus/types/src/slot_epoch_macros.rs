/// Implements the shared surface of the `Slot` and `Epoch` newtypes:
/// conversions, saturating operators against both `Self` and `u64`,
/// overflow-checked arithmetic (`SafeArith`), SSZ, tree hashing and
/// formatting.
macro_rules! impl_common {
    ($type: ident) => {
        impl_from_into_u64!($type);
        impl_cmp_between!($type, u64);
        impl_math_between!($type, $type);
        impl_math_between!($type, u64);
        impl_math!($type);
        impl_safe_arith!($type, $type);
        impl_safe_arith!($type, u64);
        impl_display!($type);
        impl_ssz!($type);
    };
}

macro_rules! impl_from_into_u64 {
    ($main: ident) => {
        impl From<u64> for $main {
            fn from(n: u64) -> $main {
                $main(n)
            }
        }

        impl From<u32> for $main {
            fn from(n: u32) -> $main {
                $main(n as u64)
            }
        }

        impl From<usize> for $main {
            fn from(n: usize) -> $main {
                $main(n as u64)
            }
        }

        impl From<$main> for u64 {
            fn from(n: $main) -> u64 {
                n.0
            }
        }

        impl $main {
            pub fn as_u64(&self) -> u64 {
                self.0
            }

            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }
        }
    };
}

/// Comparisons against a type other than `Self` (the `Self` case is derived).
macro_rules! impl_cmp_between {
    ($main: ident, $other: ident) => {
        impl PartialOrd<$other> for $main {
            /// Utilizes `partial_cmp` on the underlying `u64`.
            fn partial_cmp(&self, other: &$other) -> Option<std::cmp::Ordering> {
                let other: u64 = (*other).into();
                self.0.partial_cmp(&other)
            }
        }

        impl PartialEq<$other> for $main {
            fn eq(&self, other: &$other) -> bool {
                let other: u64 = (*other).into();
                self.0 == other
            }
        }
    };
}

macro_rules! impl_math_between {
    ($main: ident, $other: ident) => {
        impl std::ops::Add<$other> for $main {
            type Output = $main;

            fn add(self, other: $other) -> $main {
                let other: u64 = other.into();
                $main::from(self.0.saturating_add(other))
            }
        }

        impl std::ops::AddAssign<$other> for $main {
            fn add_assign(&mut self, other: $other) {
                *self = *self + other;
            }
        }

        impl std::ops::Sub<$other> for $main {
            type Output = $main;

            fn sub(self, other: $other) -> $main {
                let other: u64 = other.into();
                $main::from(self.0.saturating_sub(other))
            }
        }

        impl std::ops::SubAssign<$other> for $main {
            fn sub_assign(&mut self, other: $other) {
                *self = *self - other;
            }
        }

        impl std::ops::Mul<$other> for $main {
            type Output = $main;

            fn mul(self, rhs: $other) -> $main {
                let rhs: u64 = rhs.into();
                $main::from(self.0.saturating_mul(rhs))
            }
        }

        impl std::ops::Div<$other> for $main {
            type Output = $main;

            fn div(self, rhs: $other) -> $main {
                let rhs: u64 = rhs.into();
                $main::from(self.0.checked_div(rhs).expect("divisor must be non-zero"))
            }
        }

        impl std::ops::Rem<$other> for $main {
            type Output = $main;

            fn rem(self, modulus: $other) -> $main {
                let modulus: u64 = modulus.into();
                $main::from(self.0.checked_rem(modulus).expect("modulus must be non-zero"))
            }
        }
    };
}

macro_rules! impl_math {
    ($type: ident) => {
        impl $type {
            pub fn saturating_sub<T: Into<$type>>(&self, other: T) -> $type {
                *self - other.into()
            }

            pub fn saturating_add<T: Into<$type>>(&self, other: T) -> $type {
                *self + other.into()
            }

            pub fn is_power_of_two(&self) -> bool {
                self.0.is_power_of_two()
            }
        }
    };
}

macro_rules! impl_safe_arith {
    ($type: ident, $rhs: ident) => {
        impl safe_arith::SafeArith<$rhs> for $type {
            const ZERO: Self = $type::new(0);
            const ONE: Self = $type::new(1);

            fn safe_add(&self, other: $rhs) -> safe_arith::Result<Self> {
                let other: u64 = other.into();
                self.0.safe_add(other).map($type)
            }

            fn safe_sub(&self, other: $rhs) -> safe_arith::Result<Self> {
                let other: u64 = other.into();
                self.0.safe_sub(other).map($type)
            }

            fn safe_mul(&self, other: $rhs) -> safe_arith::Result<Self> {
                let other: u64 = other.into();
                self.0.safe_mul(other).map($type)
            }

            fn safe_div(&self, other: $rhs) -> safe_arith::Result<Self> {
                let other: u64 = other.into();
                self.0.safe_div(other).map($type)
            }

            fn safe_rem(&self, other: $rhs) -> safe_arith::Result<Self> {
                let other: u64 = other.into();
                self.0.safe_rem(other).map($type)
            }

            fn safe_shl(&self, other: u32) -> safe_arith::Result<Self> {
                self.0.safe_shl(other).map($type)
            }

            fn safe_shr(&self, other: u32) -> safe_arith::Result<Self> {
                self.0.safe_shr(other).map($type)
            }
        }
    };
}

macro_rules! impl_display {
    ($type: ident) => {
        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::fmt::Debug for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl std::str::FromStr for $type {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<$type, Self::Err> {
                u64::from_str(s).map($type)
            }
        }
    };
}

macro_rules! impl_ssz {
    ($type: ident) => {
        impl ssz::Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as ssz::Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as ssz::Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                0_u64.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl ssz::Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as ssz::Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as ssz::Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
                Ok($type(u64::from_ssz_bytes(bytes)?))
            }
        }

        impl tree_hash::TreeHash for $type {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                tree_hash::TreeHashType::Basic
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                <u64 as tree_hash::TreeHash>::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                tree_hash::TreeHash::tree_hash_root(&self.0)
            }
        }
    };
}
