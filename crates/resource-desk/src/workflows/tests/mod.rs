mod common;

mod approvals;
mod commits;
mod loans;
