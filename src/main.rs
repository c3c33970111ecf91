// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件服务器
//!
//! 基于 Tokio 运行时的多线程静态文件服务器：
//! - 每个连接持有固定容量的输出缓冲区，所有响应数据都先写入缓冲区再发送
//! - 发送只做单次非阻塞尝试，套接字暂时不可写时等待可写事件后继续
//! - 支持 `Range` 请求（单范围 206 与 multipart/byteranges）
//! - 后台管理控制台（CLI 指令交互）

use rangeserver::{
    config::Config,
    connection::Connection,
    escape::unescape_uri,
    exception::Exception,
    param::{HttpRequestMethod, HttpVersion, INDEX_FILE, MAX_HEADER_LENGTH, REQUEST_TIMEOUT_SECS},
    range::{ByteRange, RangePool},
    request::Request,
    response,
};

use log::{debug, error, info, warn};
use tokio::{
    fs::File as TokioFile,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
    time::{sleep, timeout},
};

use std::{
    io::SeekFrom,
    net::{Ipv4Addr, SocketAddrV4},
    path::{Component, Path, PathBuf},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

type SharedPool = Arc<Mutex<RangePool>>;

fn main() {
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");
    info!("www root: {}", config.www_root());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            return;
        }
    };

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);

    let listener = match TcpListener::bind(SocketAddrV4::new(address, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let config = Arc::new(config);
    let pool: SharedPool = Arc::new(Mutex::new(RangePool::new()));
    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));

    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
        Arc::clone(&pool),
    ));

    let mut id: u128 = 0;
    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("接受连接时遇到错误：{}", e);
                    continue;
                }
            },
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let config = Arc::clone(&config);
        let pool = Arc::clone(&pool);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(stream, id, config, pool).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }

    let deadline = Instant::now() + Duration::from_secs(REQUEST_TIMEOUT_SECS);
    while active_connection.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
        sleep(Duration::from_millis(100)).await;
    }
    let released = lock_pool(&pool).drain();
    info!("范围节点池已释放{}个节点，服务器已停止", released);
}

/// 后台管理控制台，读取标准输入中的运维指令。
async fn console(shutdown: Arc<Notify>, active_connection: Arc<AtomicU32>, pool: SharedPool) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将在现有连接结束后关闭...");
                shutdown.notify_one();
                break;
            }
            "status" => {
                let (allocated, available, in_use) = {
                    let pool = lock_pool(&pool);
                    (pool.allocated(), pool.available(), pool.in_use())
                };
                println!("== rangeserver 状态 ===");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("范围节点: 已分配 {}，空闲 {}，使用中 {}", allocated, available, in_use);
                println!("======================");
            }
            "help" => {
                println!("== rangeserver 帮助 ===");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("======================");
            }
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

fn lock_pool(pool: &Mutex<RangePool>) -> MutexGuard<'_, RangePool> {
    pool.lock().unwrap_or_else(|poisoned| {
        warn!("范围节点池的锁已被污染，继续使用其中的数据");
        poisoned.into_inner()
    })
}

/// # 连接处理器
///
/// 负责单个 TCP 连接的整个生命周期。支持 keep-alive：同一连接上依次处理多个请求，
/// 每个响应完全排空后才读取下一个请求。
async fn handle_connection(mut stream: TcpStream, id: u128, config: Arc<Config>, pool: SharedPool) {
    let mut conn = Connection::new(id, config.buffer_size(), config.max_ranges());
    let mut head = Vec::with_capacity(1024);

    loop {
        head.clear();
        let wait = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        match timeout(wait, read_head(&mut stream, &mut head, id)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) | Ok(Err(_)) => break,
            Err(_) => {
                debug!("[ID{}]等待请求超时", id);
                break;
            }
        }

        let start_time = Instant::now();
        let keep_alive = match Request::try_from(&head, id) {
            Ok(request) => match serve_request(&mut stream, &mut conn, &request, &config, &pool).await {
                Ok(keep_alive) => {
                    info!(
                        "[ID{}] {}, {}, {}, {}, {}ms",
                        id,
                        request.version(),
                        request.path(),
                        request.method(),
                        request.user_agent(),
                        start_time.elapsed().as_millis()
                    );
                    keep_alive
                }
                Err(e) if e.is_fatal() => {
                    debug!("[ID{}]连接已终止：{}", id, e);
                    break;
                }
                Err(e) => {
                    error!("[ID{}]处理请求时发生错误：{}", id, e);
                    break;
                }
            },
            Err(e) => {
                let code = match e {
                    Exception::UnsupportedRequestMethod => 501,
                    Exception::UnsupportedHttpVersion => 505,
                    _ => 400,
                };
                if response::send_error(&mut conn, HttpVersion::V1_1, code, &e.to_string()).is_err() {
                    break;
                }
                false
            }
        };

        conn.finish();
        if let Err(e) = drive_flush(&mut stream, &mut conn).await {
            debug!("[ID{}]发送响应失败：{}", id, e);
            break;
        }
        if !keep_alive {
            break;
        }
        conn.reset(&mut lock_pool(&pool));
    }

    conn.close(&mut lock_pool(&pool));
}

/// 读取一个完整的请求头（以空行结束）。对端关闭或请求头过长时返回 `Ok(false)`。
async fn read_head(stream: &mut TcpStream, head: &mut Vec<u8>, id: u128) -> Result<bool, Exception> {
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.map_err(|e| {
            debug!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            Exception::TransportFailure
        })?;
        if n == 0 {
            return Ok(false);
        }
        head.extend_from_slice(&chunk[..n]);
        if let Some(pos) = head.windows(4).position(|w| w == b"\r\n\r\n") {
            head.truncate(pos + 4);
            return Ok(true);
        }
        if head.len() > MAX_HEADER_LENGTH {
            warn!("[ID{}]请求头超过{}字节，关闭连接", id, MAX_HEADER_LENGTH);
            return Ok(false);
        }
    }
}

/// 反复发送缓冲区中的数据直到排空。套接字暂时不可写时等待可写事件。
async fn drive_flush(stream: &mut TcpStream, conn: &mut Connection) -> Result<(), Exception> {
    loop {
        match conn.flush(stream) {
            Ok(0) => return Ok(()),
            Ok(_) => continue,
            Err(Exception::ConnectionDead) if conn.is_drained() => return Ok(()),
            Err(Exception::WouldBlock) => {
                stream.writable().await.map_err(|e| {
                    error!("[ID{}]等待套接字可写时出错：{}", conn.id(), e);
                    Exception::TransportFailure
                })?;
            }
            Err(e) => return Err(e),
        }
    }
}

enum RangePlan {
    Full,
    Partial(Vec<ByteRange>),
    Unsatisfiable,
}

/// 依次解析所有 `Range` 头部并按资源大小修正。语法错误按没有 `Range` 处理。
fn plan_ranges(conn: &mut Connection, pool: &mut RangePool, headers: &[String]) -> RangePlan {
    for header in headers {
        if conn.parse_range(pool, header).is_err() {
            conn.reset_ranges(pool);
            return RangePlan::Full;
        }
    }
    match conn.resolve_ranges(pool) {
        Ok(ranges) => RangePlan::Partial(ranges),
        Err(_) => RangePlan::Unsatisfiable,
    }
}

/// 处理一个已解析的请求，返回连接是否可以复用。
async fn serve_request(
    stream: &mut TcpStream,
    conn: &mut Connection,
    request: &Request,
    config: &Config,
    pool: &SharedPool,
) -> Result<bool, Exception> {
    let id = conn.id();
    let version = request.version();

    let path = match unescape_uri(request.path()) {
        Ok((path, _query)) => path,
        Err(e) => {
            warn!("[ID{}]请求路径无法反转义：{}", id, request.path());
            response::send_error(conn, version, 400, &e.to_string())?;
            return Ok(false);
        }
    };

    if request.method() == HttpRequestMethod::Options {
        response::send_options(conn, version, request.keep_alive())?;
        return Ok(request.keep_alive());
    }

    let mut full_path = match route(&path, id, config.www_root()) {
        Ok(p) => p,
        Err(e @ Exception::InvalidPath) => {
            warn!("[ID{}]请求的路径：{} 包含非法字符，返回400", id, path);
            response::send_error(conn, version, 400, &e.to_string())?;
            return Ok(false);
        }
        Err(e) => {
            warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path);
            response::send_error(conn, version, 404, &e.to_string())?;
            return Ok(false);
        }
    };

    if full_path.is_dir() {
        if !path.ends_with('/') {
            let location = format!("{}/", path);
            debug!("[ID{}]目录请求缺少结尾斜杠，重定向到{}", id, location);
            response::send_redirect(conn, version, &location)?;
            return Ok(false);
        }
        full_path.push(INDEX_FILE);
        if !full_path.is_file() {
            warn!("[ID{}]目录{}下没有{}，返回404", id, path, INDEX_FILE);
            response::send_error(conn, version, 404, &Exception::FileNotFound.to_string())?;
            return Ok(false);
        }
    }

    let mut file = match TokioFile::open(&full_path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("[ID{}]无法打开文件{}：{}", id, full_path.display(), e);
            response::send_error(conn, version, 403, &e.to_string())?;
            return Ok(false);
        }
    };
    let size = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            error!("[ID{}]无法读取文件元数据：{}", id, e);
            response::send_error(conn, version, 500, &e.to_string())?;
            return Ok(false);
        }
    };
    conn.set_filesize(size);
    let mime = response::get_mime(&full_path);
    let keep_alive = request.keep_alive();
    let head_only = request.method() == HttpRequestMethod::Head;

    let mut plan = RangePlan::Full;
    if config.enable_range_requests() && !request.ranges().is_empty() {
        let mut guard = lock_pool(pool);
        plan = plan_ranges(conn, &mut guard, request.ranges());
    }

    match plan {
        RangePlan::Unsatisfiable => {
            response::send_invalid_range(conn, version, size)?;
            return Ok(false);
        }
        RangePlan::Partial(ranges) if ranges.len() == 1 => {
            let range = &ranges[0];
            response::send_single_range_headers(conn, version, mime, range, size, keep_alive)?;
            if !head_only {
                send_file_range(stream, conn, &mut file, range).await?;
            }
        }
        RangePlan::Partial(ranges) => {
            response::send_multipart_headers(conn, version, &ranges, mime, size, keep_alive)?;
            if !head_only {
                for range in &ranges {
                    write_all(stream, conn, response::part_header(range, mime, size).as_bytes()).await?;
                    send_file_range(stream, conn, &mut file, range).await?;
                }
                write_all(stream, conn, response::multipart_trailer().as_bytes()).await?;
            }
        }
        RangePlan::Full => {
            response::send_full_headers(
                conn,
                version,
                mime,
                size,
                config.enable_range_requests(),
                keep_alive,
            )?;
            if !head_only && size > 0 {
                let whole = ByteRange { start: 0, stop: size - 1 };
                send_file_range(stream, conn, &mut file, &whole).await?;
            }
        }
    }
    Ok(keep_alive)
}

/// 写入一段较短的数据，缓冲区剩余空间不足时先排空。
async fn write_all(stream: &mut TcpStream, conn: &mut Connection, bytes: &[u8]) -> Result<(), Exception> {
    if bytes.len() > conn.buffer_remaining() {
        drive_flush(stream, conn).await?;
    }
    conn.write(bytes)?;
    Ok(())
}

/// 按缓冲区剩余容量分块读取文件的 `[start, stop]` 区间并发送。
async fn send_file_range(
    stream: &mut TcpStream,
    conn: &mut Connection,
    file: &mut TokioFile,
    range: &ByteRange,
) -> Result<(), Exception> {
    let id = conn.id();
    file.seek(SeekFrom::Start(range.start)).await.map_err(|e| {
        error!("[ID{}]文件定位失败：{}", id, e);
        Exception::FileNotFound
    })?;

    let mut chunk = vec![0u8; conn.buffer().capacity()];
    let mut left = range.len();
    while left > 0 {
        if conn.buffer_remaining() == 0 {
            drive_flush(stream, conn).await?;
        }
        let want = (conn.buffer_remaining() as u64).min(left) as usize;
        let n = file.read(&mut chunk[..want]).await.map_err(|e| {
            error!("[ID{}]读取文件失败: {}", id, e);
            Exception::FileNotFound
        })?;
        if n == 0 {
            error!("[ID{}]文件在发送过程中被截断，还差{}字节", id, left);
            return Err(Exception::FileNotFound);
        }
        conn.write(&chunk[..n])?;
        left -= n as u64;
    }
    Ok(())
}

/// # 路由
///
/// 将已反转义的请求路径映射到 `www_root` 下的本地路径。
/// 路径必须以 `/` 开头，其余部分逐段拼接到根目录之后：空段、`.`、`..`、
/// 含有 `\` 的段以及任何非普通路径成分都会被拒绝，结果永远位于 `www_root` 之内。
fn route(path: &str, id: u128, root: &str) -> Result<PathBuf, Exception> {
    let relative = match path.strip_prefix('/') {
        Some(relative) => relative,
        None => return Err(Exception::InvalidPath),
    };

    let mut full_path = PathBuf::from(root);
    let segments = relative.strip_suffix('/').unwrap_or(relative);
    if !segments.is_empty() {
        for segment in segments.split('/') {
            if segment.is_empty() || segment.contains('\\') {
                return Err(Exception::InvalidPath);
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => full_path.push(name),
                _ => return Err(Exception::InvalidPath),
            }
        }
    }
    debug!("[ID{}]映射物理路径：{}", id, full_path.display());

    match full_path.exists() {
        true => Ok(full_path),
        false => Err(Exception::FileNotFound),
    }
}
