//! Conversation memory
//!
//! Bounded per-agent message windows, the store that owns them, the
//! reaper that expires idle sessions, and the handoff builder that carries
//! router context over to specialized handlers.

pub mod clock;
pub mod handoff;
pub mod reaper;
pub mod store;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use handoff::{Handoff, HandoffContextBuilder};
pub use reaper::{Reaper, SweepReport};
pub use store::{is_valid_key_component, MemoryKey, MemoryStore, KEY_SEPARATOR};
pub use window::{Message, MessageWindow, Role};
