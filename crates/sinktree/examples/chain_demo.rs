// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Three-node chain on an in-memory radio: sink <- 2 <- 3.
//!
//! Builds the tree from beacons, collects a reading from the far node,
//! then source-routes a command back down to it.
//!
//! Run with: cargo run -p sinktree --example chain_demo --features std

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sinktree::{
    Callbacks, Config, LinkLayer, Node, NodeId, RandomSource, Result, TimerId, TimerService,
};

struct Frame {
    from: NodeId,
    dest: Option<NodeId>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Medium {
    now: u64,
    frames: VecDeque<Frame>,
    timers: Vec<(NodeId, TimerId, u64)>,
}

#[derive(Clone, Default)]
struct MediumHandle(Rc<RefCell<Medium>>);

struct SimPlatform {
    addr: NodeId,
    medium: MediumHandle,
    rng: u32,
}

impl LinkLayer for SimPlatform {
    fn broadcast(&mut self, frame: &[u8]) -> Result<()> {
        self.medium.0.borrow_mut().frames.push_back(Frame {
            from: self.addr,
            dest: None,
            bytes: frame.to_vec(),
        });
        Ok(())
    }

    fn unicast(&mut self, frame: &[u8], dest: NodeId) -> Result<()> {
        self.medium.0.borrow_mut().frames.push_back(Frame {
            from: self.addr,
            dest: Some(dest),
            bytes: frame.to_vec(),
        });
        Ok(())
    }
}

impl TimerService for SimPlatform {
    fn schedule_once(&mut self, id: TimerId, delay_ms: u32) {
        let mut m = self.medium.0.borrow_mut();
        let at = m.now + u64::from(delay_ms);
        m.timers
            .retain(|(owner, timer, _)| !(*owner == self.addr && *timer == id));
        m.timers.push((self.addr, id, at));
    }

    fn cancel(&mut self, id: TimerId) {
        self.medium
            .0
            .borrow_mut()
            .timers
            .retain(|(owner, timer, _)| !(*owner == self.addr && *timer == id));
    }
}

impl RandomSource for SimPlatform {
    fn random_u16(&mut self) -> u16 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;
        (self.rng >> 8) as u16
    }
}

struct PrintCallbacks {
    addr: NodeId,
}

impl Callbacks for PrintCallbacks {
    fn recv(&mut self, source: NodeId, hops: u8, payload: &[u8]) {
        println!(
            "[{}] collected {:?} from {} over {} hops",
            self.addr,
            String::from_utf8_lossy(payload),
            source,
            hops
        );
    }

    fn sr_recv(&mut self, hops: u8, payload: &[u8]) {
        println!(
            "[{}] command {:?} from the sink over {} hops",
            self.addr,
            String::from_utf8_lossy(payload),
            hops
        );
    }
}

type DemoNode = Node<SimPlatform, PrintCallbacks>;

struct World {
    medium: MediumHandle,
    nodes: Vec<(NodeId, DemoNode)>,
    links: Vec<(NodeId, NodeId, i16)>,
}

impl World {
    fn add_node(&mut self, addr: NodeId, is_sink: bool) {
        let platform = SimPlatform {
            addr,
            medium: self.medium.clone(),
            rng: 0x1234_5678 ^ u32::from(addr.0[0]),
        };
        let node = Node::open(
            addr,
            is_sink,
            Config::lab(),
            platform,
            PrintCallbacks { addr },
        );
        self.nodes.push((addr, node));
    }

    fn rssi(&self, a: NodeId, b: NodeId) -> Option<i16> {
        self.links
            .iter()
            .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
            .map(|(_, _, r)| *r)
    }

    fn node_mut(&mut self, addr: NodeId) -> &mut DemoNode {
        &mut self.nodes.iter_mut().find(|(a, _)| *a == addr).unwrap().1
    }

    fn run_until(&mut self, t_ms: u64) {
        loop {
            let frame = self.medium.0.borrow_mut().frames.pop_front();
            if let Some(frame) = frame {
                match frame.dest {
                    None => {
                        let targets: Vec<(NodeId, i16)> = self
                            .nodes
                            .iter()
                            .map(|(a, _)| *a)
                            .filter(|a| *a != frame.from)
                            .filter_map(|a| self.rssi(frame.from, a).map(|r| (a, r)))
                            .collect();
                        for (addr, rssi) in targets {
                            self.node_mut(addr)
                                .on_broadcast_frame(frame.from, &frame.bytes, rssi);
                        }
                    }
                    Some(dest) => {
                        if self.rssi(frame.from, dest).is_some() {
                            self.node_mut(dest).on_unicast_frame(frame.from, &frame.bytes);
                        }
                    }
                }
                continue;
            }

            let next = {
                let m = self.medium.0.borrow();
                m.timers
                    .iter()
                    .filter(|(_, _, at)| *at <= t_ms)
                    .min_by_key(|(_, _, at)| *at)
                    .copied()
            };
            let Some((addr, id, at)) = next else { break };
            {
                let mut m = self.medium.0.borrow_mut();
                m.now = at;
                m.timers
                    .retain(|(owner, timer, when)| !(*owner == addr && *timer == id && *when == at));
            }
            self.node_mut(addr).on_timer(id);
        }
        self.medium.0.borrow_mut().now = t_ms;
    }
}

fn main() {
    let sink = NodeId::SINK;
    let relay = NodeId([0x02, 0x00]);
    let sensor = NodeId([0x03, 0x00]);

    let mut world = World {
        medium: MediumHandle::default(),
        nodes: Vec::new(),
        links: vec![(sink, relay, -62), (relay, sensor, -71)],
    };
    world.add_node(sink, true);
    world.add_node(relay, false);
    world.add_node(sensor, false);

    println!("building the tree from beacons...");
    world.run_until(3_000);
    for addr in [relay, sensor] {
        let n = world.node_mut(addr);
        println!("[{}] parent {} metric {}", addr, n.parent(), n.metric());
    }

    println!("sensor reports upward...");
    world
        .node_mut(sensor)
        .send(b"t=21.5C")
        .expect("sensor has a route");
    world.run_until(3_200);

    println!("sink answers downward...");
    world
        .node_mut(sink)
        .sink_send(sensor, b"interval=60")
        .expect("sink knows the topology");
    world.run_until(3_400);

    let stats = *world.node_mut(sink).stats();
    println!(
        "sink stats: {} beacons out, {} facts recorded, {} packets up, {} packets down",
        stats.beacons_sent, stats.facts_recorded, stats.data_delivered, stats.sr_sent
    );
}
