mod common;

mod tracking_tests;
