//! The auto-reply pipeline: context assembly, the send/no-send decision,
//! conflict checking and dispatch, driven by the bridge poller.

pub mod conflict;
pub mod context;
pub mod decision;
pub mod dispatch;
pub mod manual_reply;
pub mod notify;
pub mod poller;
pub mod relation;
pub mod timeparse;
pub mod verdict;

pub use conflict::{ConflictChecker, ConflictResult};
pub use context::{ContextAssembler, ContextBundle};
pub use decision::DecisionEngine;
pub use dispatch::{DECLINE_TEXT, DispatchOutcome, Dispatcher};
pub use manual_reply::{ManualReply, ManualReplyOutcome};
pub use notify::{LogNotifier, Notification, NotificationKind, Notifier};
pub use poller::{BridgePoller, PollReport};
pub use relation::RelationTier;
pub use timeparse::{TimeWindow, extract_window};
pub use verdict::{Verdict, parse_verdict};
