//! User access permissions (`/P`)

use std::fmt;

/// Bits every `/P` value carries regardless of the documented flags
pub const BASE_MASK: u32 = 0xFFFF_F0C0;

/// Individual capability bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Print (possibly degraded, see `PrintHighQuality`)
    Print,
    /// Modify contents other than annotations, forms and assembly
    Modify,
    /// Copy or extract text and graphics
    Copy,
    /// Add or modify annotations, fill forms
    Annotate,
    /// Fill existing form fields even when `Annotate` is off
    FillForms,
    /// Extract text and graphics for accessibility
    ExtractAccessibility,
    /// Insert, rotate and delete pages, create outlines
    Assemble,
    /// Print at full quality
    PrintHighQuality,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::Print,
        Permission::Modify,
        Permission::Copy,
        Permission::Annotate,
        Permission::FillForms,
        Permission::ExtractAccessibility,
        Permission::Assemble,
        Permission::PrintHighQuality,
    ];

    /// Mask of this capability within `/P`
    pub const fn bit(self) -> u32 {
        match self {
            Permission::Print => 1 << 2,
            Permission::Modify => 1 << 3,
            Permission::Copy => 1 << 4,
            Permission::Annotate => 1 << 5,
            Permission::FillForms => 1 << 8,
            Permission::ExtractAccessibility => 1 << 9,
            Permission::Assemble => 1 << 10,
            Permission::PrintHighQuality => 1 << 11,
        }
    }
}

/// Union of every documented capability bit
pub const DOCUMENTED_BITS: u32 = 0x0F3C;

/// Permission flag set
///
/// Bits outside the documented positions always read as `BASE_MASK`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permissions(u32);

impl Permissions {
    /// Every capability denied
    pub const fn deny_all() -> Self {
        Self(BASE_MASK)
    }

    /// Every capability granted
    pub const fn allow_all() -> Self {
        Self(BASE_MASK | DOCUMENTED_BITS)
    }

    /// Rebuild from the signed `/P` value, normalizing undocumented bits
    pub fn from_value(value: i32) -> Self {
        Self((value as u32 & DOCUMENTED_BITS) | BASE_MASK)
    }

    /// Signed `/P` value for the encryption dictionary
    pub fn value(&self) -> i32 {
        self.0 as i32
    }

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_allowed(&self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    /// Grant or revoke one capability
    pub fn set(&mut self, permission: Permission, allowed: bool) -> &mut Self {
        if allowed {
            self.0 |= permission.bit();
        } else {
            self.0 &= !permission.bit();
        }
        self
    }

    /// Builder-style grant
    pub fn with(mut self, permission: Permission) -> Self {
        self.set(permission, true);
        self
    }

    /// Builder-style revoke
    pub fn without(mut self, permission: Permission) -> Self {
        self.set(permission, false);
        self
    }

    /// Granted capabilities in bit order
    pub fn allowed(&self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.is_allowed(*p))
            .collect()
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::deny_all()
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permissions")
            .field("value", &self.value())
            .field("allowed", &self.allowed())
            .finish()
    }
}
