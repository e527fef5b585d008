//! Shared UI icons.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");

// Section markers
pub static PHASE: Emoji<'_, '_> = Emoji("🚀 ", "==>");
pub static COMPARE: Emoji<'_, '_> = Emoji("🔍 ", "[C]");
pub static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
