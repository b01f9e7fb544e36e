// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::LazyLock;

use prometheus::{
    IntCounter, IntCounterVec, IntGauge, register_int_counter, register_int_counter_vec,
    register_int_gauge,
};

pub const OUTCOME_LABEL: &str = "outcome";
pub const STATUS_LABEL: &str = "status";

pub static DELIVERY_REQUESTS_STARTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "delivery_requests_started_total",
        "Total number of download requests submitted"
    )
    .unwrap()
});

pub static DELIVERY_REQUESTS_SETTLED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "delivery_requests_settled_total",
        "Total number of download requests settled, by outcome",
        &[OUTCOME_LABEL]
    )
    .unwrap()
});

pub static DELIVERY_PROGRESS_EVENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "delivery_progress_events_total",
        "Total number of progress snapshots emitted, by status",
        &[STATUS_LABEL]
    )
    .unwrap()
});

pub static DELIVERY_ACTIVE_SUBSCRIPTIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "delivery_active_subscriptions",
        "Backend notification subscriptions currently held by in-flight requests"
    )
    .unwrap()
});

pub static DELIVERY_RESERVATIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "delivery_reservations",
        "Tag-set reservations currently held"
    )
    .unwrap()
});
