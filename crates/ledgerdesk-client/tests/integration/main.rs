//! Integration tests for ledgerdesk-client
//!
//! Uses wiremock to simulate the Ledgerdesk backend and verifies the
//! request pipeline end to end: refresh-and-replay, retry, demo mode,
//! classification, pagination and file transfer.


mod test_demo;
mod test_refresh;
mod test_requests;
mod test_retry;
