//! The catalog seam read by the scheduler registry.

use std::sync::Arc;

use crate::config::ScheduleConfig;
use crate::loader::ScheduleLoader;

/// Supplies the immutable schedule definitions the registry manages.
pub trait ScheduleSource: Send + Sync {
    /// Every schedule that should be live, in a stable order.
    fn schedules(&self) -> Vec<Arc<ScheduleConfig>>;
}

impl ScheduleSource for ScheduleLoader {
    fn schedules(&self) -> Vec<Arc<ScheduleConfig>> {
        self.enabled_schedules()
    }
}

impl ScheduleSource for Vec<Arc<ScheduleConfig>> {
    fn schedules(&self) -> Vec<Arc<ScheduleConfig>> {
        self.clone()
    }
}

impl ScheduleSource for Vec<ScheduleConfig> {
    fn schedules(&self) -> Vec<Arc<ScheduleConfig>> {
        self.iter().cloned().map(Arc::new).collect()
    }
}
