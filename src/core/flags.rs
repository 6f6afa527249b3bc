// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not, Sub};

/// Flag bitset carried by hubs and channels.
///
/// The low byte holds the generic flags understood by the core; every bit from
/// [`ChannelFlags::BACKEND_BASE`] upwards belongs to a backend and can only be
/// toggled on a hub through that backend's flag hooks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelFlags(u32);

impl ChannelFlags {
    pub const NONE: Self = Self(0);
    pub const READ_ONLY: Self = Self(1 << 0);
    pub const WRITE_ONLY: Self = Self(1 << 1);
    /// The hub can never lose `READ_ONLY`.
    pub const HARD_READ_ONLY: Self = Self(1 << 2);
    /// The hub can never lose `WRITE_ONLY`.
    pub const HARD_WRITE_ONLY: Self = Self(1 << 3);

    pub const DIRECTION: Self = Self(Self::READ_ONLY.0 | Self::WRITE_ONLY.0);
    pub const HARD: Self = Self(Self::HARD_READ_ONLY.0 | Self::HARD_WRITE_ONLY.0);
    pub const GENERIC: Self = Self(0xff);

    /// First bit index available to backends.
    pub const BACKEND_BASE: u32 = 8;

    /// Query backend: never fall back to a plain file.
    pub const QUERY_NO_FILE: Self = Self::backend_bit(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Backend-specific bit `n`, counted from [`Self::BACKEND_BASE`].
    pub const fn backend_bit(n: u32) -> Self {
        Self(1 << (Self::BACKEND_BASE + n))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn generic(self) -> Self {
        Self(self.0 & Self::GENERIC.0)
    }

    pub const fn backend(self) -> Self {
        Self(self.0 & !Self::GENERIC.0)
    }

    /// Soft direction bits implied by the hard bits present in `self`.
    pub const fn hard_floor(self) -> Self {
        Self((self.0 & Self::HARD.0) >> 2)
    }

    /// `self` with every hard bit's soft counterpart added.
    pub const fn with_hard_floor(self) -> Self {
        Self(self.0 | self.hard_floor().0)
    }
}

impl BitOr for ChannelFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChannelFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ChannelFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for ChannelFlags {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for ChannelFlags {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Set difference: bits of `self` not present in `rhs`.
impl Sub for ChannelFlags {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl fmt::Debug for ChannelFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMED: [(ChannelFlags, &str); 5] = [
            (ChannelFlags::READ_ONLY, "READ_ONLY"),
            (ChannelFlags::WRITE_ONLY, "WRITE_ONLY"),
            (ChannelFlags::HARD_READ_ONLY, "HARD_READ_ONLY"),
            (ChannelFlags::HARD_WRITE_ONLY, "HARD_WRITE_ONLY"),
            (ChannelFlags::QUERY_NO_FILE, "QUERY_NO_FILE"),
        ];

        if self.is_empty() {
            return write!(f, "NONE");
        }

        let mut rest = *self;
        let mut first = true;
        for (flag, name) in NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                rest = rest - flag;
                first = false;
            }
        }
        if !rest.is_empty() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{:#x}", rest.0)?;
        }
        Ok(())
    }
}
