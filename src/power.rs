use statig::{blocking::IntoStateMachineExt as _, prelude::*};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysMode {
    PowerOff,
    PowerOn,
    LowPowerMonitor,
}

impl SysMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PowerOff => "power_off",
            Self::PowerOn => "power_on",
            Self::LowPowerMonitor => "lpm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerCommand {
    Suspend { low_power: bool },
    Resume,
    PowerOff,
}

/// Work the device must carry out for an accepted transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerPlan {
    ColdStart,
    EnterLowPower,
    WakeFromLowPower,
    EnterPowerOff,
    Unchanged,
}

#[derive(Clone, Copy, Debug)]
struct DispatchContext {
    plan: PowerPlan,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            plan: PowerPlan::Unchanged,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PowerMachine {
    mode: SysMode,
}

pub struct PowerController {
    machine: statig::blocking::StateMachine<PowerMachine>,
}

impl Default for PowerController {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerController {
    pub fn new() -> Self {
        Self {
            machine: PowerMachine {
                mode: SysMode::PowerOff,
            }
            .state_machine(),
        }
    }

    pub fn mode(&self) -> SysMode {
        self.machine.inner().mode
    }

    pub fn apply(&mut self, command: PowerCommand) -> PowerPlan {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&command, &mut context);
        if context.plan != PowerPlan::Unchanged {
            log::info!(
                "touch: power_transition command={:?} plan={:?} mode={}",
                command,
                context.plan,
                self.mode().label()
            );
        }
        context.plan
    }
}

#[state_machine(initial = "State::power_off()")]
impl PowerMachine {
    #[state]
    fn power_off(&mut self, context: &mut DispatchContext, event: &PowerCommand) -> Outcome<State> {
        match event {
            PowerCommand::Resume => {
                context.plan = PowerPlan::ColdStart;
                self.mode = SysMode::PowerOn;
                Transition(State::power_on())
            }
            PowerCommand::Suspend { .. } | PowerCommand::PowerOff => Handled,
        }
    }

    #[state]
    fn power_on(&mut self, context: &mut DispatchContext, event: &PowerCommand) -> Outcome<State> {
        match event {
            PowerCommand::Suspend { low_power: true } => {
                context.plan = PowerPlan::EnterLowPower;
                self.mode = SysMode::LowPowerMonitor;
                Transition(State::low_power_monitor())
            }
            PowerCommand::Suspend { low_power: false } | PowerCommand::PowerOff => {
                context.plan = PowerPlan::EnterPowerOff;
                self.mode = SysMode::PowerOff;
                Transition(State::power_off())
            }
            PowerCommand::Resume => Handled,
        }
    }

    #[state]
    fn low_power_monitor(
        &mut self,
        context: &mut DispatchContext,
        event: &PowerCommand,
    ) -> Outcome<State> {
        match event {
            PowerCommand::Resume => {
                context.plan = PowerPlan::WakeFromLowPower;
                self.mode = SysMode::PowerOn;
                Transition(State::power_on())
            }
            PowerCommand::PowerOff => {
                context.plan = PowerPlan::EnterPowerOff;
                self.mode = SysMode::PowerOff;
                Transition(State::power_off())
            }
            PowerCommand::Suspend { .. } => Handled,
        }
    }
}

const NOISE_MODE_TA: u32 = 0;
const NOISE_MODE_CALL: u32 = 1;
const NOISE_MODE_COVER: u32 = 2;
const NOISE_MODE_EDGE: u32 = 3;
const NOISE_MODE_SENSITIVITY: u32 = 4;
const NOISE_MODE_TOUCHABLE: u32 = 5;
const NOISE_MODE_POCKET: u32 = 6;
const NOISE_MODE_HALFAOD: u32 = 7;
const NOISE_MODE_GLOVE: u32 = 8;
const NOISE_MODE_REJECTZONE: u32 = 9;
const NOISE_MODE_POWER: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    Charger,
    Call,
    Cover,
    Glove,
    Edge,
    Sensitivity,
    Touchable,
    Pocket,
    HalfAod,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RejectZone {
    pub top: u16,
    pub bottom: u16,
}

/// Scan-mode features written to the controller as one word at start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TouchFeatures {
    pub charger: bool,
    pub call: bool,
    pub cover: bool,
    pub glove: bool,
    pub edge: bool,
    pub sensitivity: bool,
    pub touchable: bool,
    pub pocket: bool,
    pub half_aod: bool,
    pub reject_zone: Option<RejectZone>,
    pub power: bool,
}

impl TouchFeatures {
    /// Sets one feature and reports whether the value changed.
    pub fn set(&mut self, feature: Feature, enabled: bool) -> bool {
        let field = match feature {
            Feature::Charger => &mut self.charger,
            Feature::Call => &mut self.call,
            Feature::Cover => &mut self.cover,
            Feature::Glove => &mut self.glove,
            Feature::Edge => &mut self.edge,
            Feature::Sensitivity => &mut self.sensitivity,
            Feature::Touchable => &mut self.touchable,
            Feature::Pocket => &mut self.pocket,
            Feature::HalfAod => &mut self.half_aod,
        };
        let changed = *field != enabled;
        *field = enabled;
        changed
    }

    pub fn to_bits(&self) -> u32 {
        let flags = [
            (self.charger, NOISE_MODE_TA),
            (self.call, NOISE_MODE_CALL),
            (self.cover, NOISE_MODE_COVER),
            (self.edge, NOISE_MODE_EDGE),
            (self.sensitivity, NOISE_MODE_SENSITIVITY),
            (self.touchable, NOISE_MODE_TOUCHABLE),
            (self.pocket, NOISE_MODE_POCKET),
            (self.half_aod, NOISE_MODE_HALFAOD),
            (self.glove, NOISE_MODE_GLOVE),
            (self.reject_zone.is_some(), NOISE_MODE_REJECTZONE),
            (self.power, NOISE_MODE_POWER),
        ];
        flags
            .iter()
            .filter(|(enabled, _)| *enabled)
            .fold(0u32, |bits, &(_, bit)| bits | (1 << bit))
    }
}

const SPONGE_AOD: u32 = 1 << 0;
const SPONGE_DOUBLETAP_WAKEUP: u32 = 1 << 1;
const SPONGE_SINGLETAP: u32 = 1 << 2;
const SPONGE_SWIPE_UP: u32 = 1 << 3;
const SPONGE_FOD: u32 = 1 << 4;

/// Gesture detection features that keep the controller monitoring while suspended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LowPowerFeatures {
    pub aod: bool,
    pub double_tap_wake: bool,
    pub single_tap: bool,
    pub swipe_up: bool,
    pub fod: bool,
    pub ear_detect: bool,
}

impl LowPowerFeatures {
    pub fn any_gesture(&self) -> bool {
        self.aod || self.double_tap_wake || self.single_tap || self.swipe_up || self.fod
    }

    /// Sponge word; the wake bit is masked out when proximity has powered the panel off.
    pub fn sponge_bits(&self, mask_wakeup: bool) -> u32 {
        let mut bits = 0;
        if self.aod {
            bits |= SPONGE_AOD;
        }
        if self.double_tap_wake && !mask_wakeup {
            bits |= SPONGE_DOUBLETAP_WAKEUP;
        }
        if self.single_tap {
            bits |= SPONGE_SINGLETAP;
        }
        if self.swipe_up {
            bits |= SPONGE_SWIPE_UP;
        }
        if self.fod {
            bits |= SPONGE_FOD;
        }
        bits
    }
}
