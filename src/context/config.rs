// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use crate::imp::ApiVersion;

/// What to ask the platform for when creating a surface and context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Bits per RGBA channel.
    pub color_bits: u8,
    /// Depth buffer sizes to try, most preferred first.
    pub depth_bits: Vec<u8>,
    /// Context versions to try, most preferred first.
    pub versions: Vec<ApiVersion>,
    /// Swap interval range assumed when presenting to a surface someone else created,
    /// since its config cannot be queried.
    pub external_swap_interval_range: (i32, i32),
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            color_bits: 8,
            depth_bits: vec![24, 16],
            versions: vec![
                ApiVersion::new(3, 2),
                ApiVersion::new(3, 1),
                ApiVersion::new(3, 0),
            ],
            external_swap_interval_range: (0, 1),
        }
    }
}
