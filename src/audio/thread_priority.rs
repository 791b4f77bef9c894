// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the output callback thread when SOUNDPAD_THREAD_PRIORITY is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

/// Reads SOUNDPAD_THREAD_PRIORITY (0-99) once, so the hot path never touches the environment.
pub fn callback_thread_priority() -> ThreadPriority {
    priority_from(std::env::var("SOUNDPAD_THREAD_PRIORITY").ok().as_deref())
}

fn priority_from(value: Option<&str>) -> ThreadPriority {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .or(Some(DEFAULT_CALLBACK_THREAD_PRIORITY))
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().is_some_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}

/// Whether to attempt RT (SCHED_FIFO) scheduling for the output callback thread.
/// Enabled unless SOUNDPAD_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !env_flag("SOUNDPAD_DISABLE_RT_AUDIO")
}

/// Raises the calling thread's priority the first time it is called for a given flag.
/// Meant to run at the top of an output callback, which executes on a thread we
/// don't create ourselves.
pub fn configure_audio_thread_priority(
    priority: ThreadPriority,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    if let Err(e) = set_current_thread_priority(priority) {
        warn!(error = ?e, "Unable to raise output callback thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            priority,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for output callback thread"),
            Err(e) => warn!(error = ?e, "Failed to set RT SCHED_FIFO for output callback thread"),
        }
    }

    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parsing() {
        let expected = |n: u8| {
            ThreadPriority::Crossplatform(ThreadPriorityValue::try_from(n).unwrap())
        };
        assert_eq!(priority_from(Some("42")), expected(42));
        assert_eq!(priority_from(Some(" 10 ")), expected(10));
        assert_eq!(priority_from(None), expected(DEFAULT_CALLBACK_THREAD_PRIORITY));
        assert_eq!(priority_from(Some("100")), expected(DEFAULT_CALLBACK_THREAD_PRIORITY));
        assert_eq!(priority_from(Some("loud")), expected(DEFAULT_CALLBACK_THREAD_PRIORITY));
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "On"] {
            assert!(is_truthy(value), "{} should be truthy", value);
        }
        for value in ["0", "false", "", "nope"] {
            assert!(!is_truthy(value), "{} should not be truthy", value);
        }
    }
}
