//! Application command handlers.

mod expiry;
mod statistics;
mod turn;

pub use expiry::ExpirySweeper;
pub use statistics::{
    estimate_cost, ConversationSummary, CostEstimate, StatisticsError, StatisticsHandler,
    UsageStatistics,
};
pub use turn::{TurnCommand, TurnError, TurnHandler, TurnResult, TurnSettings, TurnUsage};
