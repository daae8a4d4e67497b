use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartLongTaskMonitor,
    SuppressSignals,
    ApplyStyles,
    WatchLoadErrors,
    ArmBannerWatch,
    /// Performance mark label.
    Mark(&'static str),
}

impl Effect {
    /// Component whose boundary executes this effect.
    pub fn component(&self) -> Option<Component> {
        match self {
            Effect::StartLongTaskMonitor => Some(Component::LongTaskMonitor),
            Effect::SuppressSignals => Some(Component::SignalSuppressor),
            Effect::ApplyStyles => Some(Component::StyleInjector),
            Effect::WatchLoadErrors => Some(Component::LoadErrorListener),
            Effect::ArmBannerWatch => Some(Component::BannerWatcher),
            Effect::Mark(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    LongTaskMonitor,
    SignalSuppressor,
    StyleInjector,
    LoadErrorListener,
    BannerWatcher,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::LongTaskMonitor => "long task monitor",
            Component::SignalSuppressor => "signal suppressor",
            Component::StyleInjector => "style injector",
            Component::LoadErrorListener => "load error listener",
            Component::BannerWatcher => "banner watcher",
        };
        f.write_str(name)
    }
}
