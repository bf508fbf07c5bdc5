use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use crate::error::ErrorKind;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HealthCounters {
    pub scan_count: u16,
    pub scan_retry: u8,
    pub irq_err_cnt: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthPhase {
    Idle,
    Armed,
    Retrying,
    Escalated,
}

impl HealthPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Retrying => "retrying",
            Self::Escalated => "escalated",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthEvent {
    /// The periodic tick queued an idle check.
    CheckScheduled,
    /// Idle check result; `None` when the scan status was unreadable or corrupt.
    ScanRead { scan_count: Option<u16> },
    Failure(ErrorKind),
    DecodeOk,
    /// Scanning (re)started; the scan counter baseline is gone.
    Restarted,
    RecoveryFinished,
    RecoveryDropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthAction {
    /// Bring the next periodic tick forward.
    RearmFast,
    ScheduleReset(ErrorKind),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HealthOutput {
    pub actions: [Option<HealthAction>; 2],
}

impl HealthOutput {
    pub fn iter(&self) -> impl Iterator<Item = HealthAction> + '_ {
        self.actions.iter().flatten().copied()
    }

    pub fn reset_requested(&self) -> Option<ErrorKind> {
        self.iter().find_map(|action| match action {
            HealthAction::ScheduleReset(kind) => Some(kind),
            HealthAction::RearmFast => None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct DispatchContext {
    actions: [Option<HealthAction>; 2],
}

impl DispatchContext {
    fn push(&mut self, action: HealthAction) {
        for slot in &mut self.actions {
            if slot.is_none() {
                *slot = Some(action);
                return;
            }
        }
    }

    fn finish(self) -> HealthOutput {
        HealthOutput {
            actions: self.actions,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct HealthMachine {
    counters: HealthCounters,
    max_scan_retry: u8,
    max_irq_err_cnt: u8,
    escalation: Option<ErrorKind>,
}

pub struct HealthSupervisor {
    machine: statig::blocking::StateMachine<HealthMachine>,
}

impl HealthSupervisor {
    pub fn new(max_scan_retry: u8, max_irq_err_cnt: u8) -> Self {
        Self {
            machine: HealthMachine::new(max_scan_retry, max_irq_err_cnt).state_machine(),
        }
    }

    pub fn handle(&mut self, event: HealthEvent) -> HealthOutput {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        context.finish()
    }

    pub fn counters(&self) -> HealthCounters {
        self.machine.inner().counters
    }

    pub fn phase(&self) -> HealthPhase {
        match self.machine.state() {
            State::Idle { .. } => HealthPhase::Idle,
            State::Armed { .. } => HealthPhase::Armed,
            State::Retrying { .. } => HealthPhase::Retrying,
            State::Escalated { .. } => HealthPhase::Escalated,
        }
    }

    /// Failure kind that put the supervisor into `Escalated`.
    pub fn escalation(&self) -> Option<ErrorKind> {
        self.machine.inner().escalation
    }
}

impl HealthMachine {
    fn new(max_scan_retry: u8, max_irq_err_cnt: u8) -> Self {
        Self {
            counters: HealthCounters::default(),
            max_scan_retry: max_scan_retry.max(1),
            max_irq_err_cnt: max_irq_err_cnt.max(1),
            escalation: None,
        }
    }

    fn escalate(&mut self, context: &mut DispatchContext, kind: ErrorKind) -> Outcome<State> {
        log::warn!(
            "touch: recovery_scheduled kind={} irq_err={} scan_retry={}",
            kind.label(),
            self.counters.irq_err_cnt,
            self.counters.scan_retry
        );
        context.push(HealthAction::ScheduleReset(kind));
        self.escalation = Some(kind);
        Transition(State::escalated())
    }

    fn on_failure(&mut self, context: &mut DispatchContext, kind: ErrorKind) -> Outcome<State> {
        if kind.escalates_immediately() {
            return self.escalate(context, kind);
        }
        self.counters.irq_err_cnt = self.counters.irq_err_cnt.saturating_add(1);
        if self.counters.irq_err_cnt >= self.max_irq_err_cnt {
            self.counters.irq_err_cnt = 0;
            return self.escalate(context, kind);
        }
        Handled
    }

    fn on_scan(&mut self, context: &mut DispatchContext, scan_count: Option<u16>) -> Outcome<State> {
        match scan_count {
            Some(count) if count != self.counters.scan_count => {
                self.counters.scan_retry = 0;
                self.counters.scan_count = count;
                Transition(State::idle())
            }
            _ => {
                self.counters.scan_retry = self.counters.scan_retry.saturating_add(1);
                log::info!(
                    "touch: scan_stalled retry={} count={:?}",
                    self.counters.scan_retry,
                    scan_count
                );
                if self.counters.scan_retry >= self.max_scan_retry {
                    self.counters.scan_retry = 0;
                    return self.escalate(context, ErrorKind::Watchdog);
                }
                context.push(HealthAction::RearmFast);
                Transition(State::retrying())
            }
        }
    }

    fn on_decode_ok(&mut self) {
        self.counters.irq_err_cnt = 0;
        self.counters.scan_retry = 0;
    }

    fn on_restart(&mut self) {
        self.counters.scan_count = 0;
        self.counters.scan_retry = 0;
    }
}

#[state_machine(initial = "State::idle()")]
impl HealthMachine {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &HealthEvent) -> Outcome<State> {
        match event {
            HealthEvent::CheckScheduled => {
                Transition(State::armed())
            }
            HealthEvent::ScanRead { scan_count } => self.on_scan(context, *scan_count),
            HealthEvent::Failure(kind) => self.on_failure(context, *kind),
            HealthEvent::DecodeOk => {
                self.on_decode_ok();
                Handled
            }
            HealthEvent::Restarted => {
                self.on_restart();
                Handled
            }
            HealthEvent::RecoveryFinished | HealthEvent::RecoveryDropped => Handled,
        }
    }

    #[state]
    fn armed(&mut self, context: &mut DispatchContext, event: &HealthEvent) -> Outcome<State> {
        match event {
            HealthEvent::CheckScheduled => Handled,
            HealthEvent::ScanRead { scan_count } => self.on_scan(context, *scan_count),
            HealthEvent::Failure(kind) => self.on_failure(context, *kind),
            HealthEvent::DecodeOk => {
                self.on_decode_ok();
                Handled
            }
            HealthEvent::Restarted => {
                self.on_restart();
                Transition(State::idle())
            }
            HealthEvent::RecoveryFinished | HealthEvent::RecoveryDropped => Handled,
        }
    }

    #[state]
    fn retrying(&mut self, context: &mut DispatchContext, event: &HealthEvent) -> Outcome<State> {
        match event {
            HealthEvent::CheckScheduled => Handled,
            HealthEvent::ScanRead { scan_count } => self.on_scan(context, *scan_count),
            HealthEvent::Failure(kind) => self.on_failure(context, *kind),
            HealthEvent::DecodeOk => {
                self.on_decode_ok();
                Transition(State::idle())
            }
            HealthEvent::Restarted => {
                self.on_restart();
                Transition(State::idle())
            }
            HealthEvent::RecoveryFinished | HealthEvent::RecoveryDropped => Handled,
        }
    }

    #[state]
    fn escalated(&mut self, event: &HealthEvent) -> Outcome<State> {
        match event {
            HealthEvent::CheckScheduled | HealthEvent::ScanRead { .. } => Handled,
            HealthEvent::Failure(kind) => {
                log::debug!("touch: failure_while_escalated kind={}", kind.label());
                Handled
            }
            HealthEvent::DecodeOk => {
                self.on_decode_ok();
                Handled
            }
            HealthEvent::Restarted => {
                self.on_restart();
                Handled
            }
            HealthEvent::RecoveryFinished => {
                self.counters = HealthCounters::default();
                self.escalation = None;
                log::info!("touch: recovery_finished");
                Transition(State::idle())
            }
            HealthEvent::RecoveryDropped => {
                self.escalation = None;
                Transition(State::idle())
            }
        }
    }
}
