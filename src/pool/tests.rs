// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;
use std::io::Cursor;

use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Payload {
    tag: usize,
    value: f64,
}

impl Message for Payload {
    fn size_of(&self) -> usize {
        16
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        pack_usize(buf, self.tag);
        pack_f64(buf, self.value);
    }

    fn unpack(cur: &mut Cursor<&[u8]>) -> Self {
        Self {
            tag: unpack_usize(cur),
            value: unpack_f64(cur),
        }
    }
}

#[test]
fn frame_round_trip() {
    let p = Payload { tag: 7, value: -2.5 };
    let buf = frame(&p);
    assert_eq!(buf.len(), 8 + 16);
    let q: Payload = unframe(&buf).unwrap();
    assert_eq!(p, q);
    assert!(unframe::<Payload>(&termination()).is_none());
}

#[test]
fn identity_pool_processes_every_task_once() {
    // three ranks (one master, two workers), seven tasks
    let queue: VecDeque<Payload> = (0..7)
        .map(|i| Payload {
            tag: i,
            value: i as f64,
        })
        .collect();

    let mut seen = vec![0usize; 7];
    let mut case_ids = Vec::new();
    execute(
        3,
        queue,
        |task: Payload| task,
        |res: TaskResult<Payload>| {
            seen[res.output.tag] += 1;
            case_ids.push(res.case_id);
            assert!(res.rank == 1 || res.rank == 2);
        },
    )
    .unwrap();

    // exactly seven results, each task exactly once
    assert_eq!(seen, vec![1; 7]);
    // case ids are assigned serially on arrival
    assert_eq!(case_ids, (1..=7).collect::<Vec<_>>());
}

#[test]
fn more_workers_than_tasks() {
    let queue: VecDeque<Payload> = (0..2)
        .map(|i| Payload {
            tag: i,
            value: 10.0 * i as f64,
        })
        .collect();
    let mut total = 0.0;
    execute(
        8,
        queue,
        |task: Payload| Payload {
            tag: task.tag,
            value: task.value * 2.0,
        },
        |res: TaskResult<Payload>| {
            total += res.output.value;
        },
    )
    .unwrap();
    assert_eq!(total, 20.0);
}

#[test]
fn empty_queue_completes() {
    let queue: VecDeque<Payload> = VecDeque::new();
    let mut calls = 0;
    execute(
        4,
        queue,
        |task: Payload| task,
        |_res: TaskResult<Payload>| {
            calls += 1;
        },
    )
    .unwrap();
    assert_eq!(calls, 0);
}

#[test]
fn single_rank_is_rejected() {
    let queue: VecDeque<Payload> = VecDeque::new();
    let err = execute(
        1,
        queue,
        |task: Payload| task,
        |_res: TaskResult<Payload>| {},
    )
    .unwrap_err();
    assert!(matches!(err, PoolError::TooFewRanks { nranks: 1 }));
}

#[test]
fn task_panic_is_caught_and_surfaced() {
    // the panic is contained at the task boundary, reported to the
    // master as a sentinel result, and execute returns an error rather
    // than unwinding through the thread scope
    let queue: VecDeque<Payload> = (0..4)
        .map(|i| Payload {
            tag: i,
            value: 0.0,
        })
        .collect();
    let mut processed = 0usize;
    let err = execute(
        2,
        queue,
        |task: Payload| {
            if task.tag == 2 {
                panic!("boom");
            }
            task
        },
        |_res: TaskResult<Payload>| {
            processed += 1;
        },
    )
    .unwrap_err();
    assert!(matches!(err, PoolError::WorkerPanicked));
    // with one worker the first two tasks completed before the panic
    assert_eq!(processed, 2);
}

#[test]
fn task_panic_with_idle_workers_does_not_hang() {
    // the sentinel arrives like any other result, so the master errors
    // out promptly even while other workers sit idle
    let queue: VecDeque<Payload> = (0..2)
        .map(|i| Payload {
            tag: i,
            value: 0.0,
        })
        .collect();
    let err = execute(
        6,
        queue,
        |task: Payload| {
            if task.tag == 0 {
                panic!("boom");
            }
            task
        },
        |_res: TaskResult<Payload>| {},
    )
    .unwrap_err();
    assert!(matches!(err, PoolError::WorkerPanicked));
}

#[test]
fn heavy_fan_out_accumulates_commutatively() {
    let n = 200usize;
    let queue: VecDeque<Payload> = (0..n)
        .map(|i| Payload {
            tag: i,
            value: 1.0,
        })
        .collect();
    let mut sum = 0.0;
    execute(
        5,
        queue,
        |task: Payload| Payload {
            tag: task.tag,
            value: task.value + task.tag as f64,
        },
        |res: TaskResult<Payload>| {
            sum += res.output.value;
        },
    )
    .unwrap();
    // sum over i of (1 + i)
    assert_eq!(sum, n as f64 + (n * (n - 1) / 2) as f64);
}
