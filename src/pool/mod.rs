// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dynamic master/worker task distribution.
//!
//! Rank 0 (the calling thread) owns the task queue and is the only rank
//! that processes results; workers never inspect the queue. Tasks and
//! results travel as size-prefixed byte frames over per-worker channels,
//! which preserves the per-rank ordering guarantee of the original
//! point-to-point protocol; a zero-length frame is the termination
//! message. Results are processed in arrival order, which is not
//! deterministic, so result processing must be commutative.
//!
//! A panic inside the distributed task is caught at the task boundary:
//! the worker reports it to the master as a sentinel result frame and
//! stops, and the master surfaces it as an error after releasing the
//! remaining workers. Panics anywhere else are not recovered.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("at least two ranks are required to run a task pool; nranks = {nranks}")]
    TooFewRanks { nranks: usize },

    #[error("a task-pool worker panicked while performing a task")]
    WorkerPanicked,

    #[error("task-pool channel closed unexpectedly")]
    Disconnected,
}

/// A task or result that can cross a rank boundary as a byte buffer.
pub trait Message: Send {
    fn size_of(&self) -> usize;
    fn pack(&self, buf: &mut Vec<u8>);
    fn unpack(buf: &mut Cursor<&[u8]>) -> Self;
}

/// A worker's result as seen by the master: the payload plus the serial
/// number the master assigned on arrival and the rank that computed it.
pub struct TaskResult<OT> {
    pub case_id: usize,
    pub rank: usize,
    pub output: OT,
}

/// Size prefix of the frame a worker sends when its task panicked; no
/// real payload can carry it.
const PANIC_SENTINEL: u64 = u64::MAX;

fn frame<M: Message>(msg: &M) -> Vec<u8> {
    let nbytes = msg.size_of();
    let mut buf = Vec::with_capacity(8 + nbytes);
    buf.write_u64::<LittleEndian>(nbytes as u64)
        .expect("vector writes cannot fail");
    msg.pack(&mut buf);
    buf
}

fn termination() -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.write_u64::<LittleEndian>(0)
        .expect("vector writes cannot fail");
    buf
}

fn panic_frame() -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.write_u64::<LittleEndian>(PANIC_SENTINEL)
        .expect("vector writes cannot fail");
    buf
}

fn unframe<M: Message>(buf: &[u8]) -> Option<M> {
    let mut cur = Cursor::new(buf);
    let nbytes = cur.read_u64::<LittleEndian>().ok()?;
    if nbytes == 0 {
        return None;
    }
    Some(M::unpack(&mut cur))
}

fn unframe_result<M: Message>(buf: &[u8]) -> Result<M, PoolError> {
    let mut cur = Cursor::new(buf);
    match cur.read_u64::<LittleEndian>() {
        Ok(PANIC_SENTINEL) => Err(PoolError::WorkerPanicked),
        Ok(0) | Err(_) => Err(PoolError::Disconnected),
        Ok(_) => Ok(M::unpack(&mut cur)),
    }
}

/// Run the queue to completion over `nranks - 1` worker threads.
///
/// `perform_task` runs on workers only; `process_results` runs on the
/// master only, once per task, in arrival order. The function returns
/// after every worker has been terminated and joined (the barrier).
pub fn execute<IT, OT, TF, RF>(
    nranks: usize,
    mut q: VecDeque<IT>,
    perform_task: TF,
    mut process_results: RF,
) -> Result<(), PoolError>
where
    IT: Message,
    OT: Message,
    TF: Fn(IT) -> OT + Sync,
    RF: FnMut(TaskResult<OT>),
{
    if nranks < 2 {
        return Err(PoolError::TooFewRanks { nranks });
    }
    let nworkers = nranks - 1;

    thread::scope(|s| {
        // per-worker task channels keep each rank's messages ordered
        let mut task_txs: Vec<Sender<Vec<u8>>> = Vec::with_capacity(nworkers);
        let (result_tx, result_rx): (Sender<(usize, Vec<u8>)>, Receiver<(usize, Vec<u8>)>) =
            unbounded();

        for rank in 1..=nworkers {
            let (tx, rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = unbounded();
            task_txs.push(tx);
            let result_tx = result_tx.clone();
            let perform_task = &perform_task;
            s.spawn(move || {
                while let Ok(buf) = rx.recv() {
                    let Some(task) = unframe::<IT>(&buf) else {
                        break; // zero-length frame: no more tasks
                    };
                    // contain a panicking task to this worker and let the
                    // master decide; unwinding out of here would take the
                    // whole scope down
                    match catch_unwind(AssertUnwindSafe(|| perform_task(task))) {
                        Ok(out) => {
                            if result_tx.send((rank, frame(&out))).is_err() {
                                break;
                            }
                        }
                        Err(_) => {
                            let _ = result_tx.send((rank, panic_frame()));
                            break;
                        }
                    }
                }
            });
        }
        drop(result_tx);

        let outcome = (|| -> Result<(), PoolError> {
            let send_to = |rank: usize, buf: Vec<u8>| -> Result<(), PoolError> {
                task_txs[rank - 1]
                    .send(buf)
                    .map_err(|_| PoolError::Disconnected)
            };

            // initial distribution, then terminate the ranks with nothing
            // to do
            let ninit = q.len().min(nworkers);
            for rank in 1..=ninit {
                let task = q.pop_front().expect("ninit tasks are queued");
                send_to(rank, frame(&task))?;
            }
            for rank in ninit + 1..=nworkers {
                send_to(rank, termination())?;
            }

            let mut case_id = 0usize;
            let recv_result = || -> Result<(usize, OT), PoolError> {
                let (rank, buf) = result_rx.recv().map_err(|_| PoolError::Disconnected)?;
                Ok((rank, unframe_result::<OT>(&buf)?))
            };

            // listener loop: every finished worker immediately gets the
            // next task
            while !q.is_empty() {
                let (rank, output) = recv_result()?;
                let task = q.pop_front().expect("loop guard");
                send_to(rank, frame(&task))?;
                case_id += 1;
                process_results(TaskResult {
                    case_id,
                    rank,
                    output,
                });
            }

            // final collection: one last result per busy worker, then
            // terminate it
            for _ in 0..ninit {
                let (rank, output) = recv_result()?;
                send_to(rank, termination())?;
                case_id += 1;
                process_results(TaskResult {
                    case_id,
                    rank,
                    output,
                });
            }

            Ok(())
        })();

        // the barrier: closing the task channels releases any workers
        // still waiting, and leaving the scope joins them all
        drop(task_txs);
        outcome
    })
}

// Primitive packing helpers shared by message implementations.

pub fn pack_usize(buf: &mut Vec<u8>, x: usize) {
    buf.write_u64::<LittleEndian>(x as u64)
        .expect("vector writes cannot fail");
}

pub fn unpack_usize(cur: &mut Cursor<&[u8]>) -> usize {
    cur.read_u64::<LittleEndian>()
        .expect("message buffers are complete") as usize
}

pub fn pack_f64(buf: &mut Vec<u8>, x: f64) {
    buf.write_f64::<LittleEndian>(x)
        .expect("vector writes cannot fail");
}

pub fn unpack_f64(cur: &mut Cursor<&[u8]>) -> f64 {
    cur.read_f64::<LittleEndian>()
        .expect("message buffers are complete")
}
