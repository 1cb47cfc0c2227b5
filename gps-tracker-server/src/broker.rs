use std::convert::Infallible;

use gps_tracker_types::{
    DecodedRecord,
    live::LiveEvent,
};
use tokio::sync::broadcast;

use crate::ingest::Broadcast;

/// How many events a subscriber can fall behind before it starts missing
/// them.
const EVENT_QUEUE_SIZE: usize = 256;

/// Fans out live events to all current subscribers.
///
/// This is just a sender to a broadcast channel, so it's cheap to clone.
/// Publishing never blocks: subscribers that fall behind lose the oldest events
/// and are told how many they lost the next time they receive.
#[derive(Clone, Debug)]
pub struct Broker {
    event_sender: broadcast::Sender<LiveEvent>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_QUEUE_SIZE);
        Self { event_sender }
    }

    /// Publishes an event, and returns the number of subscribers that will
    /// receive it.
    pub fn publish(&self, event: LiveEvent) -> usize {
        // this only fails if there are no subscribers
        self.event_sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.event_sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_sender.receiver_count()
    }
}

impl Broadcast for Broker {
    type Error = Infallible;

    async fn broadcast(&self, record: &DecodedRecord) -> Result<usize, Self::Error> {
        Ok(self.publish(LiveEvent::GpsData(record.clone())))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gps_tracker_types::{
        DecodedRecord,
        Imei,
        live::LiveEvent,
    };
    use tokio::sync::broadcast::error::RecvError;

    use crate::broker::Broker;

    fn record(identity: u64) -> DecodedRecord {
        DecodedRecord {
            imei: Imei::from_u64(identity),
            timestamp: Utc::now(),
            latitude: None,
            longitude: None,
            altitude: None,
            speed_kph: 0.0,
            ignition_on: false,
            latitude_hex: None,
            longitude_hex: None,
            latitude_binary: None,
            longitude_binary: None,
            raw_data: String::new(),
        }
    }

    #[tokio::test]
    async fn it_publishes_to_every_subscriber() {
        let broker = Broker::new();
        let mut first = broker.subscribe();
        let mut second = broker.subscribe();

        assert_eq!(broker.publish(LiveEvent::GpsData(record(1))), 2);

        for receiver in [&mut first, &mut second] {
            let LiveEvent::GpsData(received) = receiver.recv().await.unwrap();
            assert_eq!(received.imei, Imei::from_u64(1));
        }
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let broker = Broker::default();
        assert_eq!(broker.subscriber_count(), 0);
        assert_eq!(broker.publish(LiveEvent::GpsData(record(1))), 0);
    }

    #[tokio::test]
    async fn slow_subscribers_are_told_what_they_missed() {
        let broker = Broker::new();
        let mut receiver = broker.subscribe();

        for i in 0..(super::EVENT_QUEUE_SIZE as u64 + 3) {
            broker.publish(LiveEvent::GpsData(record(i)));
        }

        assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(3))));
        let LiveEvent::GpsData(received) = receiver.recv().await.unwrap();
        assert_eq!(received.imei, Imei::from_u64(3));
    }
}
