pub use balance::{AllocatedExpense, Balance, compute_balances};
pub use commands::{CreateExpenseCmd, ExpenseListFilter, FinalizeExpenseCmd, UpdateExpenseCmd};
pub use error::EngineError;
pub use expenses::{Expense, ExpensePatch, ExpenseState, ExpenseStatus};
pub use groups::Group;
pub use members::{Member, MemberRemoval};
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder};
pub use settlement::{Transfer, compute_settlements};
pub use split::{
    Allocation, FULL_PERCENT_BASIS_POINTS, PercentShare, SplitMethod, SplitSpec, split_by_percent,
    split_equal,
};

mod balance;
mod commands;
mod error;
mod expenses;
mod groups;
mod members;
mod money;
mod ops;
mod participants;
mod settlement;
mod split;

type ResultEngine<T> = Result<T, EngineError>;
