//! Conversation layer of the restaurant assistant.
//!
//! This crate turns raw chat utterances into replies:
//! - Recognizes contact details and slot values in free text (`validators`, `slots`)
//! - Classifies each utterance against an ordered rule table (`intent`)
//! - Drives the per-session state machine and calls the booking engine (`dialogue`)
//! - Keeps sessions apart and serializes turns within one session (`runtime`)
//!
//! # Architecture
//!
//! Every turn runs the same loop:
//! 1. **Classify** (`intent`) - keyword rules, gated by the session's confirmation flags
//! 2. **Dispatch** (`dialogue`) - the handler for the current `ConversationState`
//! 3. **Persist** - customer, order and reservation writes through `BookingEngine`
//! 4. **Reply** - a plain string for the chat surface
//!
//! # Fallbacks
//!
//! Utterances no rule matches go to an `LlmClient`. The model only ever
//! produces conversational text; it never opens orders or books tables.

pub mod clock;
pub mod dialogue;
pub mod intent;
pub mod llm;
pub mod runtime;
pub mod search;
pub mod session;
pub mod slots;
pub mod validators;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dialogue::{DialogueManager, DialogueSettings};
pub use intent::{ClassifierContext, Intent, IntentClassifier};
pub use llm::{build_llm_client, ChatCompletionsClient, DisabledLlm, LlmClient};
pub use runtime::ChatRuntime;
pub use search::{KeywordMenuSearch, MenuSearch, SearchHit};
pub use session::{ConversationState, Session, SessionId};
