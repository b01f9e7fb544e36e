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

//! Route panics through `tracing` so they land in the same sinks as every
//! other event, including the error-only log file.

use std::{panic, sync::LazyLock, thread};

use backtrace::Backtrace;
use prometheus::{IntCounterVec, register_int_counter_vec};

pub static PANIC_COUNTER: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("dynres_panic_total", "Total number of panics", &["app"]).unwrap()
});

/// Install a panic hook that logs the panic, the panicking thread and a
/// backtrace as one error event, then delegates to the previous hook.
pub fn set_panic_hook(app_name: &'static str) {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let backtrace = format!("{:?}", Backtrace::new());
        let current = thread::current();
        let thread_name = current.name().unwrap_or("<unnamed>");
        match info.location() {
            Some(location) => tracing::error!(
                app = app_name,
                thread = thread_name,
                message = %info,
                backtrace = %backtrace,
                panic.file = location.file(),
                panic.line = location.line(),
                "panicked"
            ),
            None => tracing::error!(
                app = app_name,
                thread = thread_name,
                message = %info,
                backtrace = %backtrace,
                "panicked"
            ),
        }
        PANIC_COUNTER.with_label_values(&[app_name]).inc();
        default_hook(info);
    }));
}
