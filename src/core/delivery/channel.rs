use super::generator::Delivery;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::sync::Mutex;

/// Producer side of the delivery box. Owned by the tick driver.
///
/// Dropping (or [`DeliverySender::close`]) cancels every receiver.
#[derive(Debug)]
pub struct DeliverySender {
    deliveries: Sender<Delivery>,
    shutdown: Mutex<Option<Sender<()>>>,
}

/// Consumer side of the delivery box, cloned into every stocker
#[derive(Debug, Clone)]
pub struct DeliveryReceiver {
    deliveries: Receiver<Delivery>,
    shutdown: Receiver<()>,
}

/// Result of waiting on the delivery box
#[derive(Debug)]
pub enum Received {
    Delivery(Delivery),
    Cancelled,
}

/// Unbounded FIFO between the tick driver and the stockers
pub fn delivery_channel() -> (DeliverySender, DeliveryReceiver) {
    let (delivery_tx, delivery_rx) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded();
    (
        DeliverySender {
            deliveries: delivery_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
        },
        DeliveryReceiver {
            deliveries: delivery_rx,
            shutdown: shutdown_rx,
        },
    )
}

impl DeliverySender {
    /// Hand a delivery to whichever stocker asks next.
    ///
    /// Returns the delivery back if every receiver is gone.
    pub fn send(&self, delivery: Delivery) -> Result<(), Delivery> {
        self.deliveries.send(delivery).map_err(|err| err.into_inner())
    }

    /// Deliveries queued but not yet picked up
    pub fn backlog(&self) -> usize {
        self.deliveries.len()
    }

    /// Wake every blocked receiver and make further receives return `Cancelled`
    pub fn close(&self) {
        if let Ok(mut shutdown) = self.shutdown.lock() {
            shutdown.take();
        }
    }
}

impl Drop for DeliverySender {
    fn drop(&mut self) {
        self.close();
    }
}

impl DeliveryReceiver {
    /// Block until a delivery is available or the run is cancelled.
    ///
    /// Cancellation wins over queued deliveries once it has been signalled.
    pub fn recv(&self) -> Received {
        if self.is_cancelled() {
            return Received::Cancelled;
        }
        select! {
            recv(self.shutdown) -> _ => Received::Cancelled,
            recv(self.deliveries) -> msg => match msg {
                Ok(delivery) => Received::Delivery(delivery),
                Err(_) => Received::Cancelled,
            },
        }
    }

    fn is_cancelled(&self) -> bool {
        // The shutdown channel never carries messages; it only disconnects.
        matches!(
            self.shutdown.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}
