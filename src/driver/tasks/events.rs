use super::message::*;
use crate::events::GlobalEvents;
use flume::Receiver;
use tracing::{info, instrument, trace};

#[instrument(skip(evt_rx))]
pub(crate) async fn runner(evt_rx: Receiver<EventMessage>) {
    let mut global = GlobalEvents::default();

    while let Ok(msg) = evt_rx.recv_async().await {
        match msg {
            EventMessage::AddGlobalEvent(data) => {
                info!("Global event added.");
                global.add_event(data);
            },
            EventMessage::FireCoreEvent(ctx) => {
                let evt = ctx.to_core_event();

                trace!("Firing core event {:?}.", evt);

                global.fire_core_event(evt, ctx.to_user_context()).await;
            },
            EventMessage::RemoveGlobalEvents => {
                global.remove_handlers();
            },
            EventMessage::Poison => break,
        }
    }

    trace!("Event thread exited.");
}
