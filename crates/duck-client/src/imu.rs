//! BNO08x 姿态传感器，UART-RVC 模式
//!
//! 传感器上电后以 100 Hz 自主吐 19 字节帧，无需任何请求：
//!
//! ```text
//! AA AA | index | yaw lo/hi | pitch | roll | ax | ay | az | 保留×3 | chksum
//! ```
//!
//! 角度是 i16 小端百分度，加速度是 i16 小端 mg。校验和为
//! index 起 16 字节之和的低 8 位。
//!
//! 读取走后台线程 + 单槽最新值单元：新帧无条件覆盖旧帧，
//! 消费端（控制环）永不因 IMU 阻塞，也永远拿不到陈旧队列积压。

use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::ClientError;

/// UART-RVC 固定帧长
pub const FRAME_LEN: usize = 19;
/// 帧头两字节
pub const FRAME_HEADER: [u8; 2] = [0xAA, 0xAA];

const CENTIDEG: f64 = 0.01;
const MG_TO_MS2: f64 = 9.80665 / 1000.0;

/// 一帧姿态数据
///
/// 角度为度，加速度为 m/s²（传感器坐标系）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuFrame {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub accel: [f64; 3],
}

impl ImuFrame {
    /// 解析一个 19 字节帧（含帧头），校验失败返回 None
    pub fn parse(raw: &[u8]) -> Option<ImuFrame> {
        if raw.len() != FRAME_LEN || raw[..2] != FRAME_HEADER {
            return None;
        }
        let sum: u8 = raw[2..18].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        if sum != raw[18] {
            return None;
        }
        let word = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Some(ImuFrame {
            yaw: f64::from(word(3)) * CENTIDEG,
            pitch: f64::from(word(5)) * CENTIDEG,
            roll: f64::from(word(7)) * CENTIDEG,
            accel: [
                f64::from(word(9)) * MG_TO_MS2,
                f64::from(word(11)) * MG_TO_MS2,
                f64::from(word(13)) * MG_TO_MS2,
            ],
        })
    }
}

/// 帧来源：真实串口或测试桩
pub trait ImuSource: Send {
    /// 阻塞到读出下一个有效帧，流结束返回 Ok(None)
    fn next_frame(&mut self) -> Result<Option<ImuFrame>, ClientError>;
}

/// 真实串口来源，逐字节同步到帧头
pub struct SerialImu {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialImu {
    pub const DEFAULT_BAUD: u32 = 115_200;

    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, ClientError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| ClientError::Imu(format!("open {port_name}: {e}")))?;
        info!(port = port_name, baud_rate, "IMU serial port opened");
        Ok(Self { port })
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ClientError> {
        let mut b = [0u8; 1];
        loop {
            match self.port.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(b[0])),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(ClientError::Imu(format!("serial read: {e}"))),
            }
        }
    }
}

impl ImuSource for SerialImu {
    fn next_frame(&mut self) -> Result<Option<ImuFrame>, ClientError> {
        // 逐字节找 AA AA，再整帧读入；校验失败丢弃重新同步
        loop {
            let mut prev = 0u8;
            loop {
                match self.read_byte()? {
                    None => return Ok(None),
                    Some(b) => {
                        if prev == FRAME_HEADER[0] && b == FRAME_HEADER[1] {
                            break;
                        }
                        prev = b;
                    }
                }
            }
            let mut rest = [0u8; FRAME_LEN - 2];
            let mut filled = 0;
            while filled < rest.len() {
                match self.read_byte()? {
                    None => return Ok(None),
                    Some(b) => {
                        rest[filled] = b;
                        filled += 1;
                    }
                }
            }
            let mut raw = [0u8; FRAME_LEN];
            raw[..2].copy_from_slice(&FRAME_HEADER);
            raw[2..].copy_from_slice(&rest);
            match ImuFrame::parse(&raw) {
                Some(frame) => return Ok(Some(frame)),
                None => {
                    debug!("IMU checksum mismatch, resyncing");
                    continue;
                }
            }
        }
    }
}

/// 单槽最新值单元
///
/// 生产端无条件覆盖，消费端要么非阻塞拿最新，要么限时等下一帧。
#[derive(Default)]
pub struct LatestImu {
    slot: Mutex<Slot>,
    fresh: Condvar,
}

#[derive(Default)]
struct Slot {
    frame: Option<ImuFrame>,
    seq: u64,
}

impl LatestImu {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, frame: ImuFrame) {
        let mut slot = self.slot.lock();
        slot.frame = Some(frame);
        slot.seq += 1;
        self.fresh.notify_all();
    }

    /// 非阻塞：最近一帧，还没收到过任何帧则 None
    pub fn latest(&self) -> Option<ImuFrame> {
        self.slot.lock().frame
    }

    /// 等待一帧比调用时刻更新的数据，超时返回 None
    pub fn wait_fresh(&self, timeout: Duration) -> Option<ImuFrame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        let start_seq = slot.seq;
        while slot.seq == start_seq {
            if self.fresh.wait_until(&mut slot, deadline).timed_out() {
                return None;
            }
        }
        slot.frame
    }
}

/// 后台轮询线程句柄
///
/// drop 或显式 stop 都会让线程在下一帧边界退出。
pub struct ImuPoller {
    latest: Arc<LatestImu>,
    stop_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ImuPoller {
    pub fn spawn(mut source: impl ImuSource + 'static) -> Self {
        let latest = LatestImu::new();
        let (stop_tx, stop_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let shared = Arc::clone(&latest);
        let handle = thread::Builder::new()
            .name("imu-poller".into())
            .spawn(move || poll_loop(&mut source, &shared, &stop_rx))
            .unwrap_or_else(|e| panic!("failed to spawn imu-poller thread: {e}"));
        Self {
            latest,
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn latest(&self) -> Arc<LatestImu> {
        Arc::clone(&self.latest)
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("imu-poller thread panicked");
            }
        }
    }
}

impl Drop for ImuPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(source: &mut dyn ImuSource, latest: &LatestImu, stop_rx: &Receiver<()>) {
    info!("IMU poller started");
    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }
        match source.next_frame() {
            Ok(Some(frame)) => latest.publish(frame),
            Ok(None) => {
                info!("IMU stream ended");
                break;
            }
            Err(e) => {
                // 单帧错误不值得杀线程，坏流会以连续告警的形式浮现
                warn!(error = %e, "IMU frame error");
            }
        }
    }
    info!("IMU poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(yaw_cd: i16, pitch_cd: i16, roll_cd: i16, accel_mg: [i16; 3]) -> [u8; FRAME_LEN] {
        let mut raw = [0u8; FRAME_LEN];
        raw[..2].copy_from_slice(&FRAME_HEADER);
        raw[2] = 0x42; // index，解析不关心
        raw[3..5].copy_from_slice(&yaw_cd.to_le_bytes());
        raw[5..7].copy_from_slice(&pitch_cd.to_le_bytes());
        raw[7..9].copy_from_slice(&roll_cd.to_le_bytes());
        raw[9..11].copy_from_slice(&accel_mg[0].to_le_bytes());
        raw[11..13].copy_from_slice(&accel_mg[1].to_le_bytes());
        raw[13..15].copy_from_slice(&accel_mg[2].to_le_bytes());
        raw[18] = raw[2..18].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        raw
    }

    #[test]
    fn test_parse_known_frame() {
        // yaw 90.00°, pitch -12.34°, roll 0.50°, accel (0, 0, 1000 mg)
        let raw = build_frame(9000, -1234, 50, [0, 0, 1000]);
        let frame = ImuFrame::parse(&raw).unwrap();
        assert!((frame.yaw - 90.0).abs() < 1e-9);
        assert!((frame.pitch + 12.34).abs() < 1e-9);
        assert!((frame.roll - 0.5).abs() < 1e-9);
        assert!((frame.accel[2] - 9.80665).abs() < 1e-9);
        assert_eq!(frame.accel[0], 0.0);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let mut raw = build_frame(100, 200, 300, [0, 0, 0]);
        raw[18] ^= 0xFF;
        assert!(ImuFrame::parse(&raw).is_none());
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        let mut raw = build_frame(100, 200, 300, [0, 0, 0]);
        raw[0] = 0x55;
        assert!(ImuFrame::parse(&raw).is_none());
    }

    #[test]
    fn test_latest_overwrites() {
        let latest = LatestImu::new();
        assert!(latest.latest().is_none());
        latest.publish(ImuFrame { yaw: 1.0, ..Default::default() });
        latest.publish(ImuFrame { yaw: 2.0, ..Default::default() });
        // 消费端只看得到最后一帧，没有积压
        assert_eq!(latest.latest().unwrap().yaw, 2.0);
        assert_eq!(latest.latest().unwrap().yaw, 2.0);
    }

    #[test]
    fn test_wait_fresh_times_out_without_producer() {
        let latest = LatestImu::new();
        latest.publish(ImuFrame::default());
        // 已有旧帧也不算：wait_fresh 只认调用之后发布的
        assert!(latest.wait_fresh(Duration::from_millis(10)).is_none());
    }

    /// 预置帧序列的测试桩
    struct ScriptedSource {
        frames: Vec<ImuFrame>,
    }

    impl ImuSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<ImuFrame>, ClientError> {
            if self.frames.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.frames.remove(0)))
            }
        }
    }

    #[test]
    fn test_poller_publishes_then_stops_on_stream_end() {
        let frames = vec![
            ImuFrame { yaw: 1.0, ..Default::default() },
            ImuFrame { yaw: 7.5, ..Default::default() },
        ];
        let poller = ImuPoller::spawn(ScriptedSource { frames });
        let latest = poller.latest();
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if latest.latest().map(|f| f.yaw) == Some(7.5) {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(latest.latest().unwrap().yaw, 7.5);
        poller.stop();
    }
}
