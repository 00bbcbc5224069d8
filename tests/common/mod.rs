#![allow(dead_code, unused_imports)]

pub use seqrun_test_utils::builders;
pub use seqrun_test_utils::init_tracing;
