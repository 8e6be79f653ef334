// Register test modules
pub mod ledger_tests;
