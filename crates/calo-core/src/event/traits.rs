use super::store::EventStore;
use crate::domain::CaloResult;
use rand::RngCore;

/// One reconstruction step: reads arrays from the store and appends new ones.
pub trait EventModule: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, store: &mut EventStore, rng: &mut dyn RngCore) -> CaloResult<()>;
}

impl<T> EventModule for &T
where
    T: EventModule + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn process(&self, store: &mut EventStore, rng: &mut dyn RngCore) -> CaloResult<()> {
        (**self).process(store, rng)
    }
}
