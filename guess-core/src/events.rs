use guess_types::{ConnectionId, ServerMessage};

/// Addressing for an outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Broadcast(ServerMessage),
    BroadcastExcept {
        except: ConnectionId,
        message: ServerMessage,
    },
    Unicast {
        target: ConnectionId,
        message: ServerMessage,
    },
}

impl Delivery {
    pub fn message(&self) -> &ServerMessage {
        match self {
            Delivery::Broadcast(message) => message,
            Delivery::BroadcastExcept { message, .. } => message,
            Delivery::Unicast { message, .. } => message,
        }
    }

    /// Whether `connection_id` is among the recipients.
    pub fn reaches(&self, connection_id: ConnectionId) -> bool {
        match self {
            Delivery::Broadcast(_) => true,
            Delivery::BroadcastExcept { except, .. } => *except != connection_id,
            Delivery::Unicast { target, .. } => *target == connection_id,
        }
    }
}

/// Push channel to connected clients. Sending must not fail the session;
/// implementations drop messages for connections that are gone.
pub trait EventSink: Send {
    fn deliver(&mut self, delivery: Delivery);

    fn broadcast(&mut self, message: ServerMessage) {
        self.deliver(Delivery::Broadcast(message));
    }

    fn broadcast_except(&mut self, except: ConnectionId, message: ServerMessage) {
        self.deliver(Delivery::BroadcastExcept { except, message });
    }

    fn send_to(&mut self, target: ConnectionId, message: ServerMessage) {
        self.deliver(Delivery::Unicast { target, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestSink {
        deliveries: Vec<Delivery>,
    }

    impl EventSink for TestSink {
        fn deliver(&mut self, delivery: Delivery) {
            self.deliveries.push(delivery);
        }
    }

    #[test]
    fn test_delivery_recipients() {
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let mut sink = TestSink {
            deliveries: Vec::new(),
        };

        sink.broadcast_except(
            alice,
            ServerMessage::TimerUpdate {
                seconds_remaining: 3,
            },
        );
        sink.send_to(
            bob,
            ServerMessage::AlreadyAnswered {
                message: "done".to_string(),
            },
        );

        assert!(!sink.deliveries[0].reaches(alice));
        assert!(sink.deliveries[0].reaches(bob));
        assert!(sink.deliveries[1].reaches(bob));
        assert!(!sink.deliveries[1].reaches(alice));
    }
}
