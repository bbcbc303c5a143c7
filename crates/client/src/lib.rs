//! Caller-side status polling client.
//!
//! Given a job id, [`poller::JobPoller`] repeatedly fetches the current
//! snapshot on a fixed interval, delivers updates to a
//! [`poller::JobObserver`], and stops the moment a terminal status is
//! observed. The loop is abandonable at any time via
//! [`poller::PollerHandle::abandon`].

pub mod poller;
pub mod source;
