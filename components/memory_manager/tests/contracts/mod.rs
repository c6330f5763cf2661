//! Contract tests for the heap: refcount conservation, teardown, guards.

mod api_contract;
