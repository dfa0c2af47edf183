use std::time::{Duration, Instant};

/// A set of repeating timers, each firing a copy of its task.
///
/// The scheduler only decides *when*; the caller decides what a task means.
/// Ticks that are missed because the caller was late are not replayed: a
/// timer that fires re-arms at `now + period`.
#[derive(Debug)]
pub struct Scheduler<T> {
    timers: Vec<Timer<T>>,
}

#[derive(Debug)]
struct Timer<T> {
    task: T,
    period: Duration,
    deadline: Instant,
}

impl<T: Copy + PartialEq> Scheduler<T> {
    pub fn new() -> Self {
        Self { timers: Vec::new() }
    }

    /// Registers `task` to fire every `period`, first at `start + period`.
    pub fn every(&mut self, period: Duration, task: T, start: Instant) {
        self.timers.push(Timer {
            task,
            period,
            deadline: start + period,
        });
    }

    /// Stops every timer carrying `task`.
    pub fn cancel(&mut self, task: T) {
        self.timers.retain(|t| t.task != task);
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// Tasks whose deadline is at or before `now`, in registration order.
    pub fn due(&mut self, now: Instant) -> Vec<T> {
        let mut fired = Vec::new();
        for timer in self.timers.iter_mut() {
            if timer.deadline <= now {
                fired.push(timer.task);
                timer.deadline = now + timer.period;
            }
        }
        fired
    }
}

impl<T: Copy + PartialEq> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tick {
        Fast,
        Slow,
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_each_timer_at_its_own_cadence() {
        let start = Instant::now();
        let mut sched = Scheduler::new();
        sched.every(ms(100), Tick::Fast, start);
        sched.every(ms(500), Tick::Slow, start);

        assert!(sched.due(start + ms(50)).is_empty());
        assert_eq!(sched.due(start + ms(100)), [Tick::Fast]);
        assert_eq!(sched.next_deadline(), Some(start + ms(200)));

        let mut fast = 1;
        let mut slow = 0;
        for step in 2..=10 {
            for tick in sched.due(start + ms(step * 100)) {
                match tick {
                    Tick::Fast => fast += 1,
                    Tick::Slow => slow += 1,
                }
            }
        }
        assert_eq!(fast, 10);
        assert_eq!(slow, 2);
    }

    #[test]
    fn late_ticks_are_not_replayed() {
        let start = Instant::now();
        let mut sched = Scheduler::new();
        sched.every(ms(100), Tick::Fast, start);

        assert_eq!(sched.due(start + ms(1000)), [Tick::Fast]);
        assert!(sched.due(start + ms(1050)).is_empty());
        assert_eq!(sched.next_deadline(), Some(start + ms(1100)));
    }

    #[test]
    fn cancelled_timer_stops_firing() {
        let start = Instant::now();
        let mut sched = Scheduler::new();
        sched.every(ms(100), Tick::Fast, start);
        sched.every(ms(100), Tick::Slow, start);
        sched.cancel(Tick::Fast);

        assert_eq!(sched.due(start + ms(100)), [Tick::Slow]);
        sched.cancel(Tick::Slow);
        assert!(sched.is_empty());
        assert_eq!(sched.next_deadline(), None);
    }
}
